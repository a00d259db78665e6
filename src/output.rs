use crate::G;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::model::{Model, Observer};
use crate::node::{DISCHARGE, Node};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn create(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

// 14 decimals with a signed, at least two-digit exponent: 2.50000000000000e-01
struct Scientific(f64);

impl fmt::Display for Scientific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{:.14e}", self.0);
        let Some((mantissa, exponent)) = text.split_once('e') else {
            return f.write_str(&text);
        };
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        write!(f, "{mantissa}e{sign}{digits:0>2}")
    }
}

// One line per node: station, the five conserved variables and bed level
pub fn write_variables(mesh: &Mesh, w: &mut impl Write) -> Result<()> {
    for node in &mesh.nodes {
        write!(w, "{}", Scientific(node.x))?;
        for value in node.state {
            write!(w, " {}", Scientific(value))?;
        }
        writeln!(w, " {}", Scientific(node.zb))?;
    }
    Ok(())
}

fn momentum_flux(node: &Node) -> f64 {
    node.state[DISCHARGE] * node.hyd.u
}

/**
Momentum balance terms of every interface.

Each line holds the mid station, the advective flux gradient, the bed-slope
term, the surface-slope term and the friction term, all per unit length.
*/
pub fn write_flows(mesh: &Mesh, w: &mut impl Write) -> Result<()> {
    for pair in mesh.nodes.windows(2) {
        let (n1, n2) = (&pair[0], &pair[1]);
        let ix = n1.ix;
        let ga = 0.5 * G * (n1.area() + n2.area());
        writeln!(
            w,
            "{} {} {} {} {}",
            Scientific(0.5 * (n1.x + n2.x)),
            Scientific((momentum_flux(n2) - momentum_flux(n1)) / ix),
            Scientific(ga * (n2.zb - n1.zb) / ix),
            Scientific(ga * (n2.hyd.h - n1.hyd.h) / ix),
            Scientific(0.5 * ga * (n1.hyd.sf + n2.hyd.sf)),
        )?;
    }
    Ok(())
}

// Optional per-run outputs written while the model advances
#[derive(Default)]
pub struct Recorder {
    pub advance: Option<Box<dyn Write>>, // Time and front station every step
    pub probes: Option<Box<dyn Write>>,  // Depth and concentration at the probes
}

impl Recorder {
    pub fn flush(&mut self) -> Result<()> {
        for w in [&mut self.advance, &mut self.probes].into_iter().flatten() {
            w.flush()?;
        }
        Ok(())
    }
}

impl Observer for Recorder {
    fn step(&mut self, model: &Model) -> Result<()> {
        if let Some(w) = self.advance.as_mut() {
            writeln!(w, "{} {}", model.t, model.mesh.advance())?;
        }
        Ok(())
    }

    fn interval(&mut self, model: &Model) -> Result<()> {
        let Some(w) = self.probes.as_mut() else {
            return Ok(());
        };
        write!(w, "{}", model.t)?;
        for &x in &model.probes {
            let node = &model.mesh.nodes[model.mesh.nearest_node(x)];
            write!(w, " {} {}", node.hyd.h, node.hyd.s)?;
        }
        writeln!(w)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AREA;
    use crate::test_support::rectangular_channel;

    #[test]
    fn variables_use_fourteen_digits() {
        let channel = rectangular_channel(10.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        mesh.nodes[1].state[AREA] = 0.25;
        let mut out = Vec::new();
        write_variables(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let fields: Vec<&str> = lines[1].split(' ').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], "5.00000000000000e+00");
        assert_eq!(fields[1], "2.50000000000000e-01");
        assert_eq!(fields[2], "0.00000000000000e+00");
    }

    #[test]
    fn exponents_keep_their_sign_and_width() {
        assert_eq!(Scientific(1234.5).to_string(), "1.23450000000000e+03");
        assert_eq!(Scientific(-2e-120).to_string(), "-2.00000000000000e-120");
        assert_eq!(Scientific(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn flows_have_one_line_per_interface() {
        let channel = rectangular_channel(10.0, 1.0, 0.01);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        for node in &mut mesh.nodes {
            node.state[AREA] = 0.1;
            node.update_geometry();
        }
        let mut out = Vec::new();
        write_flows(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let first: Vec<f64> = text
            .lines()
            .next()
            .unwrap()
            .split(' ')
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(first[0], 2.5);
        // Bed falls 0.05 m over 5 m
        approx::assert_relative_eq!(first[2], -G * 0.1 * 0.01, max_relative = 1e-12);
    }
}
