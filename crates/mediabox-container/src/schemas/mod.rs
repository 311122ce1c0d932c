//! Built-in schemas for the standard container records of each format.
//!
//! Concrete leaf decoders beyond these live outside the core and plug in
//! through [`Registry::register`].

pub mod asf;
pub mod iso;
pub mod riff;

use crate::{Convention, Registry};

impl Registry {
    /// ISO-BMFF registry with the standard container boxes and `ftyp`.
    pub fn iso_bmff() -> Self {
        let mut registry = Self::new(Convention::IsoBmff);
        iso::register(&mut registry);
        registry
    }

    /// RIFF registry with `RIFF`/`LIST` and the `INFO` text chunks.
    pub fn riff() -> Self {
        let mut registry = Self::new(Convention::Riff);
        riff::register(&mut registry);
        registry
    }

    /// ASF registry with the Header and Header Extension objects.
    pub fn asf() -> Self {
        let mut registry = Self::new(Convention::Asf);
        asf::register(&mut registry);
        registry
    }

    /// Built-in registry for `convention`.
    pub fn for_convention(convention: Convention) -> Self {
        match convention {
            Convention::IsoBmff => Self::iso_bmff(),
            Convention::Riff => Self::riff(),
            Convention::Asf => Self::asf(),
        }
    }
}
