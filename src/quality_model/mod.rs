//! Quality model: aspects, product factors, measures and signed impacts
//!
//! ```text
//!   HighLevelAspect ─contains─▶ QualityAspect ◀─impact─┐
//!                                                      ProductFactor ─owns─▶ Measure
//!                               ProductFactor ◀─impact─┘
//! ```

pub mod definition;
mod instance;

pub use definition::{
    Entity, EntityRelation, EntityRelationType, HighLevelAspect, ImpactDefinition, ImpactType,
    LiteratureSource, Measure, MeasureScale, ProductFactor, QualityAspect,
    QualityModelDefinition,
};
pub use instance::{Impact, ImpactTarget, QualityModelInstance};
