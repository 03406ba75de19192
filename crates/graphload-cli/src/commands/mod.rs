pub mod check;
pub mod estimate;
pub mod run;
