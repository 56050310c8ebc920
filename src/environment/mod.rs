//! Environment models: planet ephemerides and magnetic field.

pub mod magnetic_dipole;
pub mod planet_ephemeris;

pub use magnetic_dipole::{MagneticDipole, MagneticDipoleConfig};
pub use planet_ephemeris::{PlanetEphemeris, PlanetEphemerisConfig, PlanetOrbit};
