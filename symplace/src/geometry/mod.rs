mod contour;

pub use contour::{Contour, ContourSegment};
