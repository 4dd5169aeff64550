//! Engine input generation.
//!
//! Two ways of producing a Gaussian input are supported:
//!
//! - **Template substitution**: an existing input file is kept line for line
//!   except for its coordinate block, which is replaced by a new geometry.
//!   The coordinate block is the first run of lines with exactly four tokens
//!   (symbol and three numbers), terminated by a blank line.
//! - **Free-form rendering**: energy and coupling inputs are rendered from a
//!   [`JobResources`] record and a geometry, without any template.
//!
//! Coordinates are written with six decimals, the precision of the engine's
//! own orientation tables, so a geometry survives a render/parse round trip.

use crate::geometry::{Atom, Geometry};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while generating inputs.
#[derive(Error, Debug)]
pub enum InputError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The template has no recognisable coordinate block
    #[error("could not find a coordinate block in the template")]
    NoCoordinateBlock,
    /// A coordinate line inside the block cannot be read
    #[error("invalid coordinate line in template: '{0}'")]
    InvalidCoordinate(String),
}

/// Type alias for input-generation results
pub type Result<T> = std::result::Result<T, InputError>;

/// Which TD-DFT manifold an energy job asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateWindow {
    /// `td=(singlets,...)`
    Singlets,
    /// `td=(triplets,...)`
    Triplets,
    /// `td=(50-50,...)`, both manifolds in one run
    Mixed,
}

impl fmt::Display for StateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateWindow::Singlets => "singlets",
            StateWindow::Triplets => "triplets",
            StateWindow::Mixed => "50-50",
        };
        f.write_str(s)
    }
}

impl FromStr for StateWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "singlets" | "singlet" => Ok(StateWindow::Singlets),
            "triplets" | "triplet" => Ok(StateWindow::Triplets),
            "50-50" | "mixed" => Ok(StateWindow::Mixed),
            other => Err(format!("unknown state window '{}'", other)),
        }
    }
}

/// Resources and level of theory for generated jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResources {
    /// `%nprocshared`
    pub cores: u32,
    /// `%mem` in GB
    pub memory_gb: u32,
    /// Method and basis, e.g. `b3lyp/6-311++g`
    pub method_basis: String,
    /// Number of TD-DFT states
    pub nstates: u32,
    /// Molecular charge
    pub charge: i32,
    /// Ground-state spin multiplicity
    pub multiplicity: u32,
}

impl Default for JobResources {
    fn default() -> Self {
        Self {
            cores: 4,
            memory_gb: 4,
            method_basis: "b3lyp/6-31g(d)".to_string(),
            nstates: 10,
            charge: 0,
            multiplicity: 1,
        }
    }
}

/// A template cut around its coordinate block.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParts<'a> {
    /// Lines before the coordinate block
    pub header: Vec<&'a str>,
    /// The coordinate lines themselves
    pub coordinates: Vec<&'a str>,
    /// Lines after the blank line that closes the block
    pub trailer: Vec<&'a str>,
}

fn is_coordinate_line(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.len() == 4 && tokens[1..].iter().all(|t| t.parse::<f64>().is_ok())
}

/// Locates the coordinate block of a template.
pub fn split_template(template: &str) -> Result<TemplateParts<'_>> {
    let lines: Vec<&str> = template.lines().collect();
    let start = lines
        .iter()
        .position(|l| is_coordinate_line(l))
        .ok_or(InputError::NoCoordinateBlock)?;
    let end = lines[start..]
        .iter()
        .position(|l| l.trim().is_empty())
        .map(|offset| start + offset)
        .ok_or(InputError::NoCoordinateBlock)?;

    if let Some(bad) = lines[start..end].iter().find(|l| !is_coordinate_line(l)) {
        return Err(InputError::InvalidCoordinate(bad.trim().to_string()));
    }

    Ok(TemplateParts {
        header: lines[..start].to_vec(),
        coordinates: lines[start..end].to_vec(),
        trailer: lines[end + 1..].to_vec(),
    })
}

/// Formats a geometry as right-aligned coordinate lines (no trailing newline).
pub fn format_coordinates(geom: &Geometry) -> String {
    geom.atoms
        .iter()
        .map(|a| {
            format!(
                " {:<2} {:>24.6} {:>11.6} {:>11.6}",
                a.symbol, a.position.x, a.position.y, a.position.z
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn assemble(header: &[&str], geom: &Geometry, trailer: &[&str]) -> String {
    let mut out = String::new();
    for line in header {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format_coordinates(geom));
    out.push_str("\n\n");
    for line in trailer {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Replaces the template's coordinate block with `geom`, keeping every other
/// line verbatim.
///
/// ```
/// use kisc::geometry::{Atom, Geometry};
/// use kisc::input::substitute_coordinates;
///
/// let template = "# opt b3lyp\n\ntitle\n\n0 1\n H 0.0 0.0 0.0\n H 0.0 0.0 0.7\n\n";
/// let geom = Geometry::new(vec![Atom::new("H", 0.0, 0.0, 0.0), Atom::new("H", 0.0, 0.0, 0.74)]);
/// let out = substitute_coordinates(template, &geom).unwrap();
/// assert!(out.starts_with("# opt b3lyp\n\ntitle\n\n0 1\n"));
/// assert!(out.contains("0.740000"));
/// ```
pub fn substitute_coordinates(template: &str, geom: &Geometry) -> Result<String> {
    let parts = split_template(template)?;
    Ok(assemble(&parts.header, geom, &parts.trailer))
}

/// Reads the template's own coordinate block as a geometry.
pub fn template_geometry(template: &str) -> Result<Geometry> {
    let parts = split_template(template)?;
    let mut atoms = Vec::with_capacity(parts.coordinates.len());
    for line in parts.coordinates {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let parse = |t: &str| {
            t.parse::<f64>()
                .map_err(|_| InputError::InvalidCoordinate(line.trim().to_string()))
        };
        atoms.push(Atom::new(
            tokens[0],
            parse(tokens[1])?,
            parse(tokens[2])?,
            parse(tokens[3])?,
        ));
    }
    Ok(Geometry::new(atoms))
}

fn geom_keyword<'a>(route: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    route
        .into_iter()
        .flat_map(str::split_whitespace)
        .find(|t| t.to_lowercase().starts_with("geom"))
}

/// Route section of an input: from the first `#` line to the next blank line.
fn route_lines<'a>(header: &[&'a str]) -> Vec<&'a str> {
    header
        .iter()
        .skip_while(|l| !l.trim_start().starts_with('#'))
        .take_while(|l| !l.trim().is_empty())
        .copied()
        .collect()
}

/// Replaces both the header and the coordinate block, keeping the trailer
/// (connectivity, basis or ECP sections) of the template.
///
/// A non-empty trailer is only read by the engine when the route asks for
/// it, so the template's `geom=` keyword is carried into the new route;
/// without one, `geom=connectivity` is added.
pub fn with_preamble(template: &str, preamble: &str, geom: &Geometry) -> Result<String> {
    let parts = split_template(template)?;
    let mut header: Vec<String> = preamble.lines().map(str::to_string).collect();

    let has_trailer = parts.trailer.iter().any(|l| !l.trim().is_empty());
    let preamble_route = route_lines(&preamble.lines().collect::<Vec<_>>());
    if has_trailer && geom_keyword(preamble_route).is_none() {
        let keyword = geom_keyword(route_lines(&parts.header)).unwrap_or("geom=connectivity");
        if let Some(route) = header.iter_mut().find(|l| l.trim_start().starts_with('#')) {
            route.push(' ');
            route.push_str(keyword);
        }
    }

    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    Ok(assemble(&header, geom, &parts.trailer))
}

/// Link-0, route, title and charge/multiplicity for an excitation-energy job.
pub fn energy_preamble(name: &str, window: StateWindow, res: &JobResources) -> String {
    format!(
        "%nprocshared={}\n%mem={}GB\n%chk={}.chk\n# td=({},nstates={}) {}\n\n{}\n\n{} {}\n",
        res.cores,
        res.memory_gb,
        name,
        window,
        res.nstates,
        res.method_basis,
        name,
        res.charge,
        res.multiplicity
    )
}

/// Preamble for the Gaussian run feeding the coupling post-processor.
///
/// The post-processor reads `gaussian.rwf` and `gaussian.chk`, and needs the
/// basis printed (`gfinput`) in Cartesian-function form (`10f 6d`).
pub fn coupling_preamble(name: &str, res: &JobResources) -> String {
    format!(
        "%rwf=gaussian.rwf\n%nprocshared={}\n%mem={}GB\n%chk=gaussian.chk\n\
         # td=(50-50,nstates={}) {} nosymm gfinput\n10f 6d\n\n{}_soc\n\n{} {}\n",
        res.cores, res.memory_gb, res.nstates, res.method_basis, name, res.charge, res.multiplicity
    )
}

/// Full excitation-energy input for `geom`.
pub fn render_energy_input(
    name: &str,
    window: StateWindow,
    geom: &Geometry,
    res: &JobResources,
) -> String {
    let preamble = energy_preamble(name, window, res);
    let header: Vec<&str> = preamble.lines().collect();
    assemble(&header, geom, &[])
}

/// Full coupling input for `geom`.
pub fn render_coupling_input(name: &str, geom: &Geometry, res: &JobResources) -> String {
    let preamble = coupling_preamble(name, res);
    let header: Vec<&str> = preamble.lines().collect();
    assemble(&header, geom, &[])
}

/// Writes generated input to disk.
pub fn write_input(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    log::debug!("Wrote input {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{GaussianLogParser, LogParser};

    const TEMPLATE: &str = "\
%nprocshared=3
%mem=2GB
# opt freq b3lyp/6-31g(d) geom=connectivity

sooos opt

0 1
 C                  0.00000000    0.00000000    0.00000000
 O                  0.00000000    0.00000000    1.20000000
 H                  0.94000000    0.00000000   -0.54000000

 1 2 2.0 3 1.0
 2
 3

";

    fn geom() -> Geometry {
        Geometry::new(vec![
            Atom::new("C", 0.1, -0.2, 0.0),
            Atom::new("O", 0.0, 0.0, 1.234567),
            Atom::new("H", 0.943, 0.0, -0.55),
        ])
    }

    #[test]
    fn test_split_template() {
        let parts = split_template(TEMPLATE).unwrap();
        assert_eq!(parts.header.len(), 7);
        assert_eq!(parts.header[6], "0 1");
        assert_eq!(parts.coordinates.len(), 3);
        assert_eq!(parts.trailer, vec![" 1 2 2.0 3 1.0", " 2", " 3", ""]);
    }

    #[test]
    fn test_substitute_preserves_header_and_trailer() {
        let out = substitute_coordinates(TEMPLATE, &geom()).unwrap();
        let template_lines: Vec<&str> = TEMPLATE.lines().collect();
        let out_lines: Vec<&str> = out.lines().collect();
        assert_eq!(&out_lines[..7], &template_lines[..7]);
        assert_eq!(&out_lines[10..], &template_lines[10..]);
        assert_eq!(
            out_lines[7],
            " C                  0.100000   -0.200000    0.000000"
        );
        assert!(out.ends_with(" 3\n\n"));
    }

    #[test]
    fn test_route_line_is_not_a_coordinate_block() {
        let template = "# opt freq b3lyp/6-31g\n\ntitle\n\n0 1\n";
        assert!(matches!(
            split_template(template),
            Err(InputError::NoCoordinateBlock)
        ));
    }

    #[test]
    fn test_unterminated_block_is_rejected() {
        let template = "0 1\n H 0.0 0.0 0.0";
        assert!(matches!(
            split_template(template),
            Err(InputError::NoCoordinateBlock)
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let original = geom();
        let rendered = substitute_coordinates(TEMPLATE, &original).unwrap();
        let reparsed = template_geometry(&rendered).unwrap();
        assert_eq!(reparsed.symbols(), original.symbols());
        for (a, b) in original.atoms.iter().zip(&reparsed.atoms) {
            assert!((a.position - b.position).amax() < 5e-7);
        }
    }

    #[test]
    fn test_round_trip_through_log_geometry() {
        let log = "\
                         Standard orientation:
 ---------------------------------------------------------------------
 Center     Atomic      Atomic             Coordinates (Angstroms)
 Number     Number       Type             X           Y           Z
 ---------------------------------------------------------------------
      1          6           0        0.012345   -0.678901    1.234567
      2          8           0       -1.111111    2.222222   -3.333333
 ---------------------------------------------------------------------
";
        let parsed = GaussianLogParser::default().geometry(log).unwrap();
        let template = "0 1\n C 0.0 0.0 0.0\n O 0.0 0.0 1.0\n\n";
        let rendered = substitute_coordinates(template, &parsed).unwrap();
        let back = template_geometry(&rendered).unwrap();
        assert_eq!(back, parsed);
    }

    #[test]
    fn test_energy_input() {
        let res = JobResources {
            cores: 25,
            memory_gb: 60,
            method_basis: "b3lyp/6-311++g".to_string(),
            ..JobResources::default()
        };
        let out = render_energy_input("energy_dis_7_+0.5", StateWindow::Singlets, &geom(), &res);
        assert!(out.starts_with(
            "%nprocshared=25\n%mem=60GB\n%chk=energy_dis_7_+0.5.chk\n# td=(singlets,nstates=10) b3lyp/6-311++g\n\nenergy_dis_7_+0.5\n\n0 1\n C "
        ));
        assert!(out.ends_with("\n\n"));
        assert_eq!(template_geometry(&out).unwrap().num_atoms(), 3);
    }

    #[test]
    fn test_coupling_input() {
        let out = render_coupling_input("soc_dis_7_+0.5", &geom(), &JobResources::default());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "%rwf=gaussian.rwf");
        assert_eq!(lines[3], "%chk=gaussian.chk");
        assert_eq!(lines[4], "# td=(50-50,nstates=10) b3lyp/6-31g(d) nosymm gfinput");
        assert_eq!(lines[5], "10f 6d");
        assert_eq!(lines[7], "soc_dis_7_+0.5_soc");
        assert_eq!(lines[9], "0 1");
    }

    #[test]
    fn test_with_preamble_keeps_trailer() {
        let preamble = energy_preamble("sooos_st-energy", StateWindow::Mixed, &JobResources::default());
        let out = with_preamble(TEMPLATE, &preamble, &geom()).unwrap();
        assert!(out.contains("# td=(50-50,nstates=10) b3lyp/6-31g(d) geom=connectivity\n"));
        assert!(!out.contains("opt freq"));
        assert!(out.ends_with(" 1 2 2.0 3 1.0\n 2\n 3\n\n"));
    }

    #[test]
    fn test_trailer_without_geom_keyword_gets_connectivity() {
        let template = TEMPLATE.replace(" geom=connectivity", "");
        let preamble = coupling_preamble("sooos", &JobResources::default());
        let out = with_preamble(&template, &preamble, &geom()).unwrap();
        assert!(out.contains(" nosymm gfinput geom=connectivity\n10f 6d\n"));
        assert_eq!(out.matches("geom=").count(), 1);
    }

    #[test]
    fn test_no_trailer_leaves_route_alone() {
        let template = "# opt freq b3lyp/6-31g(d) Geom=AllCheck\n\nt\n\n0 1\n H 0.0 0.0 0.0\n\n";
        let preamble = energy_preamble("t", StateWindow::Mixed, &JobResources::default());
        let one = Geometry::new(vec![Atom::new("H", 0.0, 0.0, 0.0)]);
        let out = with_preamble(template, &preamble, &one).unwrap();
        assert!(out.contains("# td=(50-50,nstates=10) b3lyp/6-31g(d)\n"));
        assert!(!out.contains("geom"));
    }

    #[test]
    fn test_state_window_parse() {
        assert_eq!("50-50".parse::<StateWindow>().unwrap(), StateWindow::Mixed);
        assert_eq!("Singlets".parse::<StateWindow>().unwrap(), StateWindow::Singlets);
        assert!("quartets".parse::<StateWindow>().is_err());
    }
}
