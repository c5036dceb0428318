pub mod atom;
pub mod bond;
pub mod element;
pub mod formula;
pub mod geom;
pub mod graph;
pub mod molecule;
pub mod notation;
pub mod options;
pub mod result;
pub mod ring;
pub mod substruct;

pub use atom::{AtomGroup, AtomId};
pub use bond::{Bond, BondKind};
pub use formula::{FormulaMode, FormulaUnit};
pub use geom::{AtomPlacement, BoundingBox, Extent, MoleculeGeometry, Point};
pub use graph::{BondRef, PathCeiling, PathLimits, ValenceViolation};
pub use molecule::Molecule;
pub use notation::{
    parse, parse_with, ErrorCategory, ErrorKind, ParseError,
    RingDigitsExhausted,
};
pub use options::ParseOptions;
pub use result::ParseResult;
pub use ring::{Ring, RingId};
pub use substruct::{AtomPattern, BondPattern, Match, Pattern};
