pub mod cards;
pub mod flows;
pub mod stages;
