//! Frame composition: snapshot overlay, caption and the lead-in/lead-out splice.

pub mod caption;
pub mod composer;
pub mod composite;

pub use caption::{CaptionStamp, CaptionStyle, Captions};
pub use composer::FrameComposer;
