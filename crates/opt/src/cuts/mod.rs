mod enumerate;
mod factor;
mod reconv;

pub use enumerate::{Cut, CutEngine, CutParams, cuts_of_width};
pub use factor::{factor_cut, factor_cut_large};
pub use reconv::reconv_cut;
