//! Memory-window backends.
//!
//! `devmem` maps the live SoC I/O window through `/dev/mem`; `sim`
//! provides an in-process window for tests and CI without hardware.

pub mod devmem;
pub mod sim;

pub use devmem::DevMemWindow;
pub use sim::SimWindow;
