use common::{DecodeHit, Point, Rect};

/// 没有几何信息时标签的位置
pub const DEFAULT_ANCHOR: Point = Point { x: 10, y: 30 };
const LABEL_OFFSET: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(Vec<Point>),
    Rect(Rect),
    None,
}

/// 一个识别结果的绘制指令
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub shape: Shape,
    pub label: String,
    pub anchor: Point,
    pub is_new: bool,
}

fn raised(x: i32, y: i32) -> Point {
    Point::new(x, (y - LABEL_OFFSET).max(0))
}

/// 每个识别结果都生成绘制指令，不受去重影响
pub fn annotate(hit: &DecodeHit, is_new: bool) -> Annotation {
    let (shape, anchor) = match (&hit.polygon, hit.rect) {
        (Some(polygon), _) if !polygon.is_empty() => {
            let first = polygon[0];
            (Shape::Polygon(polygon.clone()), raised(first.x, first.y))
        }
        (_, Some(rect)) => (Shape::Rect(rect), raised(rect.x, rect.y)),
        _ => (Shape::None, DEFAULT_ANCHOR),
    };

    let label = if hit.data.is_empty() {
        hit.symbology.to_string()
    } else {
        format!("{}: {}", hit.symbology, hit.data)
    };

    Annotation {
        shape,
        label,
        anchor,
        is_new,
    }
}
