use crate::G;
use crate::geometry::Section;

// Indices of the conserved variables in `Node::state`
pub const AREA: usize = 0;
pub const DISCHARGE: usize = 1;
pub const SOLUTE: usize = 2;
pub const INFILTRATED: usize = 3;
pub const INFILTRATED_SOLUTE: usize = 4;

// Quantities derived from the state, recomputed after every step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Hydraulics {
    pub h: f64,           // Depth [m]
    pub zs: f64,          // Surface level [m]
    pub b: f64,           // Surface width [m]
    pub p: f64,           // Wetted perimeter [m]
    pub c: f64,           // Critical velocity sqrt(g A / B) [m/s]
    pub u: f64,           // Velocity [m/s]
    pub s: f64,           // Solute concentration [kg/m³]
    pub beta: f64,        // Momentum correction factor [-]
    pub f: f64,           // Friction coefficient, Sf = f Q |Q|
    pub sf: f64,          // Friction slope [-]
    pub l1: f64,          // Fastest characteristic speed [m/s]
    pub l2: f64,          // Slowest characteristic speed [m/s]
    pub flux: f64,        // Momentum flux [m⁴/s²]
    pub solute_flux: f64, // Q s [kg/s]
    pub kx: f64,          // Dispersion coefficient [m²/s]
    pub kxa: f64,         // Kx A [m⁴/s]
    pub i: f64,           // Infiltration velocity [m/s]
    pub pi: f64,          // P i [m²/s]
}

/**
Control volume of the finite-volume mesh.

The geometric attributes are fixed when the mesh is opened. `state` holds the
conserved variables (area, discharge, solute mass, infiltrated area and
infiltrated solute mass, all per unit length) and `hyd` caches everything
derived from them.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub x: f64,    // Station [m]
    pub dx: f64,   // Control volume width [m]
    pub ix: f64,   // Distance to the next node [m]
    pub zb: f64,   // Bed level [m]
    pub b0: f64,   // Bottom width [m]
    pub z: f64,    // Side slope [-]
    pub zmax: f64, // Maximum level [m]
    pub state: [f64; 5],
    pub hyd: Hydraulics,
}

impl Node {
    pub fn new(x: f64, dx: f64, ix: f64, section: Section) -> Self {
        let mut node = Node {
            x,
            dx,
            ix,
            zb: section.zb,
            b0: section.b0,
            z: section.z,
            zmax: section.zmax,
            state: [0.0; 5],
            hyd: Hydraulics::default(),
        };
        node.update_geometry();
        node
    }

    pub fn area(&self) -> f64 {
        self.state[AREA]
    }

    pub fn discharge(&self) -> f64 {
        self.state[DISCHARGE]
    }

    pub fn is_wet(&self) -> bool {
        self.state[AREA] > 0.0
    }

    pub fn depth_for_area(&self, a: f64) -> f64 {
        if a <= 0.0 {
            return 0.0;
        }
        // Root of Z h² + B0 h - A written without cancellation
        2.0 * a / (self.b0 + (self.b0 * self.b0 + 4.0 * a * self.z).sqrt())
    }

    pub fn area_for_depth(&self, h: f64) -> f64 {
        let h = h.max(0.0);
        h * (self.b0 + self.z * h)
    }

    pub fn area_at_level(&self, zs: f64) -> f64 {
        self.area_for_depth(zs - self.zb)
    }

    pub fn width_for_depth(&self, h: f64) -> f64 {
        self.b0 + 2.0 * self.z * h
    }

    // Depth, surface level, width, perimeter and critical velocity
    pub fn update_geometry(&mut self) {
        let a = self.state[AREA];
        let h = self.depth_for_area(a);
        let b = self.width_for_depth(h);
        self.hyd.h = h;
        self.hyd.zs = self.zb + h;
        self.hyd.b = b;
        self.hyd.p = self.b0 + 2.0 * (1.0 + self.z * self.z).sqrt() * h;
        self.hyd.c = if b > 0.0 && a > 0.0 {
            (G * a / b).sqrt()
        } else {
            0.0
        };
    }

    pub fn critical_discharge(&self) -> f64 {
        self.state[AREA].max(0.0) * self.hyd.c
    }

    // Keeps the discharge below the critical one
    pub fn subcritical_discharge(&mut self) {
        self.state[DISCHARGE] = self.state[DISCHARGE].min(0.99 * self.critical_discharge());
    }

    pub fn close_outlet(&mut self) {
        self.state[DISCHARGE] = 0.0;
    }

    // Free outfall: at least the critical discharge leaves the reach
    pub fn open_outlet(&mut self) {
        self.state[DISCHARGE] = self.state[DISCHARGE].max(1.01 * self.critical_discharge());
    }

    pub fn is_overflowing(&self) -> bool {
        self.is_wet() && self.hyd.zs > self.zmax
    }

    /**
    Depth at which discharge `q` is critical in this section.

    The bracket is found by doubling from 1 m while the flow is supercritical
    and halving while it is subcritical, then refined by bisection until its
    width falls below `tolerance`.
    */
    pub fn critical_depth(&self, q: f64, tolerance: f64) -> f64 {
        let q = q.abs();
        if q == 0.0 || !q.is_finite() {
            return 0.0;
        }
        let supercritical = |h: f64| {
            let a = self.area_for_depth(h);
            let b = self.width_for_depth(h);
            let u = q / a;
            u * u * b > G * a
        };

        let mut high = 1.0;
        while supercritical(high) {
            high *= 2.0;
        }
        let mut low = high;
        loop {
            low *= 0.5;
            if supercritical(low) || low == 0.0 {
                break;
            }
            high = low;
        }
        let tolerance = tolerance.max(f64::EPSILON * high);
        while high - low > tolerance {
            let mid = 0.5 * (low + high);
            if supercritical(mid) {
                low = mid;
            } else {
                high = mid;
            }
        }
        0.5 * (low + high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trapezoid() -> Node {
        Node::new(
            0.0,
            1.0,
            1.0,
            Section {
                zb: 1.0,
                b0: 0.2,
                z: 1.5,
                zmax: 2.0,
            },
        )
    }

    #[test]
    fn depth_inverts_area() {
        let node = trapezoid();
        for h in [1e-6, 0.01, 0.3, 2.0] {
            let a = node.area_for_depth(h);
            assert_relative_eq!(node.depth_for_area(a), h, max_relative = 1e-12);
        }
        assert_eq!(node.depth_for_area(-1.0), 0.0);
    }

    #[test]
    fn rectangular_depth_is_linear() {
        let mut node = trapezoid();
        node.z = 0.0;
        node.b0 = 0.5;
        assert_relative_eq!(node.depth_for_area(0.1), 0.2);
    }

    #[test]
    fn dry_geometry_is_finite() {
        let mut node = trapezoid();
        node.b0 = 0.0;
        node.update_geometry();
        assert_eq!(node.hyd.h, 0.0);
        assert_eq!(node.hyd.c, 0.0);
        assert_eq!(node.hyd.zs, node.zb);
    }

    #[test]
    fn critical_depth_gives_unit_froude_number() {
        let node = trapezoid();
        let q = 0.05;
        let h = node.critical_depth(q, 1e-9);
        let a = node.area_for_depth(h);
        let b = node.width_for_depth(h);
        let froude = q / a / (G * a / b).sqrt();
        assert_relative_eq!(froude, 1.0, max_relative = 1e-6);
        assert_eq!(node.critical_depth(0.0, 1e-3), 0.0);
    }

    #[test]
    fn critical_depth_of_a_rectangle() {
        let mut node = trapezoid();
        node.z = 0.0;
        node.b0 = 1.0;
        let q: f64 = 0.2;
        let expected = (q * q / G).cbrt();
        assert!((node.critical_depth(q, 1e-3) - expected).abs() < 1e-3);
    }

    #[test]
    fn boundary_discharges() {
        let mut node = trapezoid();
        node.state[AREA] = node.area_for_depth(0.1);
        node.update_geometry();
        node.state[DISCHARGE] = 10.0;
        node.subcritical_discharge();
        assert_relative_eq!(node.discharge(), 0.99 * node.critical_discharge());

        node.state[DISCHARGE] = 0.0;
        node.open_outlet();
        assert_relative_eq!(node.discharge(), 1.01 * node.critical_discharge());

        node.close_outlet();
        assert_eq!(node.discharge(), 0.0);
    }
}
