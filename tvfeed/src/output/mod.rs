pub mod m3u;
pub mod xmltv;

pub use m3u::generate_m3u;
pub use xmltv::GuideDocument;
