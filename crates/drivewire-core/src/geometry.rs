//! Screen coordinates, regions and image-processing parameters.

use serde::{Deserialize, Serialize};

use crate::codec::Arg;

/// A screen coordinate reported by or sent to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift the point by an offset.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Midpoint between two points.
    pub fn center_between(self, other: Point) -> Self {
        Self::new(
            self.x + (other.x - self.x) / 2.0,
            self.y + (other.y - self.y) / 2.0,
        )
    }

    /// Parse the driver's `x|y` notation.
    pub fn parse(text: &str) -> Option<Self> {
        let (x, y) = text.split_once('|')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(f64::from(x), f64::from(y))
    }
}

/// An element's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl Rect {
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn center(&self) -> Point {
        self.top_left.center_between(self.bottom_right)
    }

    /// Parse the driver's `x1|y1|x2|y2` notation.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<f64> = text
            .split('|')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [x1, y1, x2, y2] => Some(Self::new(Point::new(*x1, *y1), Point::new(*x2, *y2))),
            _ => None,
        }
    }
}

/// Search region `(start_x, start_y, end_x, end_y)`. All zeros means full screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

impl Region {
    pub const FULL_SCREEN: Region = Region {
        start_x: 0,
        start_y: 0,
        end_x: 0,
        end_y: 0,
    };

    pub fn new(start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    pub fn is_full_screen(&self) -> bool {
        *self == Self::FULL_SCREEN
    }

    /// The four wire arguments, in order.
    pub fn to_args(self) -> [Arg; 4] {
        [
            Arg::from(self.start_x),
            Arg::from(self.start_y),
            Arg::from(self.end_x),
            Arg::from(self.end_y),
        ]
    }
}

/// Thresholding applied to the screenshot before matching.
///
/// `kind` follows the driver's numbering: 0 binary, 1 binary inverted,
/// 2 to-zero, 3 to-zero inverted, 4 truncate, 5 adaptive mean,
/// 6 adaptive gaussian. Kind 0 with zero threshold leaves the image as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    pub kind: i32,
    pub threshold: i32,
    pub max_val: i32,
}

impl Algorithm {
    pub const ADAPTIVE_MEAN: i32 = 5;
    pub const ADAPTIVE_GAUSSIAN: i32 = 6;

    pub fn new(kind: i32, threshold: i32, max_val: i32) -> Self {
        Self {
            kind,
            threshold,
            max_val,
        }
    }

    /// Adaptive kinds ignore the caller's threshold and always use 127/255.
    pub fn normalized(self) -> Self {
        if matches!(self.kind, Self::ADAPTIVE_MEAN | Self::ADAPTIVE_GAUSSIAN) {
            Self::new(self.kind, 127, 255)
        } else {
            self
        }
    }

    /// The three wire arguments after normalization.
    pub fn to_args(self) -> [Arg; 3] {
        let n = self.normalized();
        [Arg::from(n.kind), Arg::from(n.threshold), Arg::from(n.max_val)]
    }
}

/// A secondary colour at an offset from the primary match, used by colour search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubColor {
    pub offset_x: i32,
    pub offset_y: i32,
    pub color: String,
}

impl SubColor {
    pub fn new(offset_x: i32, offset_y: i32, color: impl Into<String>) -> Self {
        Self {
            offset_x,
            offset_y,
            color: color.into(),
        }
    }
}

/// Encode sub-colours as `x/y/#color` lines, or `null` when there are none.
pub fn encode_sub_colors(sub_colors: &[SubColor]) -> String {
    if sub_colors.is_empty() {
        return "null".to_string();
    }
    sub_colors
        .iter()
        .map(|c| format!("{}/{}/{}", c.offset_x, c.offset_y, c.color))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_parse() {
        assert_eq!(Point::parse("10.5|20.0"), Some(Point::new(10.5, 20.0)));
        assert_eq!(Point::parse("-1.0|-1.0"), Some(Point::new(-1.0, -1.0)));
        assert_eq!(Point::parse("10.5"), None);
        assert_eq!(Point::parse("a|b"), None);
    }

    #[test]
    fn test_point_center_between() {
        let center = Point::new(0.0, 0.0).center_between(Point::new(10.0, 20.0));
        assert_eq!(center, Point::new(5.0, 10.0));
    }

    #[test]
    fn test_rect_parse_and_center() {
        let rect = Rect::parse("10|20|30|60").unwrap();
        assert_eq!(rect.top_left, Point::new(10.0, 20.0));
        assert_eq!(rect.center(), Point::new(20.0, 40.0));
        assert!(Rect::parse("1|2|3").is_none());
    }

    #[test]
    fn test_adaptive_algorithm_is_normalized() {
        assert_eq!(Algorithm::new(5, 10, 20).normalized(), Algorithm::new(5, 127, 255));
        assert_eq!(Algorithm::new(6, 0, 0).normalized(), Algorithm::new(6, 127, 255));
        assert_eq!(Algorithm::new(1, 10, 20).normalized(), Algorithm::new(1, 10, 20));
    }

    #[test]
    fn test_region_default_is_full_screen() {
        assert!(Region::default().is_full_screen());
        assert!(!Region::new(0, 0, 100, 100).is_full_screen());
    }

    #[test]
    fn test_encode_sub_colors() {
        assert_eq!(encode_sub_colors(&[]), "null");
        let colors = [SubColor::new(1, 2, "#ffffff"), SubColor::new(-3, 4, "#000000")];
        assert_eq!(encode_sub_colors(&colors), "1/2/#ffffff\n-3/4/#000000");
    }
}
