// 按本地名匹配元素，忽略命名空间前缀

use super::client::MediaProfile;

struct Element<'a> {
    attrs: &'a str,
    inner: &'a str,
    end: usize,
}

fn find_element<'a>(xml: &'a str, local: &str, from: usize) -> Option<Element<'a>> {
    let mut pos = from;
    loop {
        let start = pos + xml.get(pos..)?.find('<')?;
        let rest = &xml[start + 1..];
        pos = start + 1;

        if rest.starts_with(|c: char| c == '/' || c == '?' || c == '!') {
            continue;
        }
        let name_end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
        let qname = &rest[..name_end];
        if qname.rsplit(':').next() != Some(local) {
            continue;
        }

        let tag_close = rest.find('>')?;
        let attrs = &rest[name_end..tag_close];
        let content_start = start + 1 + tag_close + 1;
        if attrs.trim_end().ends_with('/') {
            return Some(Element {
                attrs: attrs.trim_end().trim_end_matches('/'),
                inner: "",
                end: content_start,
            });
        }

        let close = format!("</{}>", qname);
        let close_at = content_start + xml[content_start..].find(&close)?;
        return Some(Element {
            attrs,
            inner: &xml[content_start..close_at],
            end: close_at + close.len(),
        });
    }
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    let mut search = attrs;
    while let Some(idx) = search.find(name) {
        let before = search[..idx].chars().last();
        let after = &search[idx + name.len()..];
        let boundary = before.map_or(true, |c| c.is_whitespace());
        if boundary {
            let after = after.trim_start();
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let body = &value[1..];
                    let end = body.find(quote)?;
                    return Some(unescape(&body[..end]));
                }
            }
        }
        search = &search[idx + name.len()..];
    }
    None
}

pub(crate) fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// 第一个同名元素的文本内容
pub fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let element = find_element(xml, tag, 0)?;
    let value = element.inner.trim();
    if value.is_empty() {
        None
    } else {
        Some(unescape(value))
    }
}

/// GetCapabilities 响应里某个服务（Media、PTZ ...）的 XAddr
pub fn extract_capability_xaddr(xml: &str, capability: &str) -> Option<String> {
    let mut pos = 0;
    while let Some(element) = find_element(xml, capability, pos) {
        if let Some(xaddr) = extract_xml_value(element.inner, "XAddr") {
            return Some(xaddr);
        }
        pos = element.end;
    }
    None
}

pub fn extract_profiles(xml: &str) -> Vec<MediaProfile> {
    let mut profiles = Vec::new();
    let mut pos = 0;
    while let Some(element) = find_element(xml, "Profiles", pos) {
        if let Some(token) = attribute(element.attrs, "token") {
            profiles.push(MediaProfile {
                token,
                name: extract_xml_value(element.inner, "Name").unwrap_or_default(),
            });
        }
        pos = element.end;
    }
    profiles
}

/// SOAP Fault 的 Reason 文本
pub fn extract_fault_reason(xml: &str) -> Option<String> {
    let fault = find_element(xml, "Fault", 0)?;
    find_element(fault.inner, "Reason", 0)
        .and_then(|reason| extract_xml_value(reason.inner, "Text"))
        .or_else(|| extract_xml_value(fault.inner, "faultstring"))
        .or_else(|| Some(fault.inner.trim().to_string()))
}
