// ms-core/src/units.rs

use uom::si::f64::{
    AngularVelocity as UomAngularVelocity, ElectricCurrent as UomElectricCurrent,
    ElectricPotential as UomElectricPotential, ElectricalResistance as UomElectricalResistance,
    Inductance as UomInductance, MomentOfInertia as UomMomentOfInertia,
};

// Public canonical unit types (SI, f64)
pub type AngularVelocity = UomAngularVelocity;
pub type Current = UomElectricCurrent;
pub type Voltage = UomElectricPotential;
pub type Resistance = UomElectricalResistance;
pub type Inductance = UomInductance;
pub type Inertia = UomMomentOfInertia;

#[inline]
pub fn volt(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

#[inline]
pub fn ampere(v: f64) -> Current {
    use uom::si::electric_current::ampere;
    Current::new::<ampere>(v)
}

#[inline]
pub fn ohm(v: f64) -> Resistance {
    use uom::si::electrical_resistance::ohm;
    Resistance::new::<ohm>(v)
}

#[inline]
pub fn henry(v: f64) -> Inductance {
    use uom::si::inductance::henry;
    Inductance::new::<henry>(v)
}

#[inline]
pub fn kg_m2(v: f64) -> Inertia {
    use uom::si::moment_of_inertia::kilogram_square_meter;
    Inertia::new::<kilogram_square_meter>(v)
}

#[inline]
pub fn rad_per_s(v: f64) -> AngularVelocity {
    use uom::si::angular_velocity::radian_per_second;
    AngularVelocity::new::<radian_per_second>(v)
}

/// Plain SI magnitudes for the unit types above.
pub mod si {
    use super::*;

    #[inline]
    pub fn volts(v: Voltage) -> f64 {
        v.get::<uom::si::electric_potential::volt>()
    }

    #[inline]
    pub fn amperes(i: Current) -> f64 {
        i.get::<uom::si::electric_current::ampere>()
    }

    #[inline]
    pub fn ohms(r: Resistance) -> f64 {
        r.get::<uom::si::electrical_resistance::ohm>()
    }

    #[inline]
    pub fn henries(l: Inductance) -> f64 {
        l.get::<uom::si::inductance::henry>()
    }

    #[inline]
    pub fn kg_m2(j: Inertia) -> f64 {
        j.get::<uom::si::moment_of_inertia::kilogram_square_meter>()
    }

    #[inline]
    pub fn rad_per_s(w: AngularVelocity) -> f64 {
        w.get::<uom::si::angular_velocity::radian_per_second>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _v = volt(6.0);
        let _i = ampere(0.5);
        let _r = ohm(8.57);
        let _l = henry(0.1692);
        let _j = kg_m2(2.7e-6);
        let _w = rad_per_s(100.0);
    }

    #[test]
    fn si_magnitudes_roundtrip() {
        assert_eq!(si::volts(volt(6.0)), 6.0);
        assert_eq!(si::ohms(ohm(8.57)), 8.57);
        assert!((si::henries(henry(0.1692)) - 0.1692).abs() < 1e-15);
        assert!((si::kg_m2(kg_m2(2.7e-6)) - 2.7e-6).abs() < 1e-20);
        assert_eq!(si::rad_per_s(rad_per_s(42.0)), 42.0);
        assert_eq!(si::amperes(ampere(1.5)), 1.5);
    }
}
