pub mod bed;
pub mod source;

pub use bed::{TestBed, dns, host, network, node};
pub use source::FakeSource;
