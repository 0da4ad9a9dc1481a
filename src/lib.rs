pub mod bbox;
pub mod bootstrap;
pub mod candidates;
pub mod config;
pub mod dataset;
pub mod feature;
pub mod ferns;
pub mod frame;
pub mod image;
pub mod math;
pub mod my_types;
pub mod optical_flow;
pub mod pyramid;
pub mod similarity;
pub mod tld;
pub mod tracker;

pub use crate::bbox::{BoundingBox, Rect, Size};
pub use crate::config::TldParams;
pub use crate::image::{Image, ImageView};
pub use crate::tld::Tld;
