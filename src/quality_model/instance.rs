//! Queryable, validated quality model
//!
//! Built once from a [`QualityModelDefinition`] and read-only afterwards.
//! Impacts are resolved into factor or aspect targets and indexed both by
//! source and by target, so evaluation can walk the impact graph backwards
//! from the active aspects without scanning the impact list.

use super::definition::{
    Entity, HighLevelAspect, ImpactType, LiteratureSource, Measure, MeasureScale, ProductFactor,
    QualityAspect, QualityModelDefinition,
};
use crate::error::{EngineError, EngineResult};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use tracing::debug;

/// Catalog shipped with the crate
const BUILTIN_CATALOG: &str = include_str!("../../catalog/quality_model.toml");

/// Resolved end of an impact edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ImpactTarget {
    ProductFactor(String),
    QualityAspect(String),
}

impl ImpactTarget {
    pub fn id(&self) -> &str {
        match self {
            ImpactTarget::ProductFactor(id) | ImpactTarget::QualityAspect(id) => id,
        }
    }
}

/// Signed edge from a product factor to a factor or aspect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Impact {
    pub source: String,
    pub target: ImpactTarget,
    pub impact_type: ImpactType,
}

/// Validated quality model with impact indices
#[derive(Debug, Clone)]
pub struct QualityModelInstance {
    literature: BTreeMap<String, LiteratureSource>,
    entities: BTreeMap<String, Entity>,
    high_level_aspects: BTreeMap<String, HighLevelAspect>,
    quality_aspects: BTreeMap<String, QualityAspect>,
    product_factors: BTreeMap<String, ProductFactor>,
    measures: BTreeMap<String, Measure>,
    impacts: Vec<Impact>,
    /// target id -> positions in `impacts`
    incoming: FxHashMap<String, Vec<usize>>,
    /// source factor id -> positions in `impacts`
    outgoing: FxHashMap<String, Vec<usize>>,
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    kind: &str,
    id: &str,
    value: T,
) -> EngineResult<()> {
    if map.insert(id.to_string(), value).is_some() {
        return Err(EngineError::InvalidQualityModel(format!(
            "duplicate {} id '{}'",
            kind, id
        )));
    }
    Ok(())
}

impl QualityModelInstance {
    /// The catalog bundled with the crate
    pub fn builtin() -> EngineResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let definition: QualityModelDefinition = toml::from_str(content)
            .map_err(|e| EngineError::InvalidQualityModel(format!("catalog parse error: {}", e)))?;
        Self::from_definition(definition)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidQualityModel(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate a definition and build the indices
    pub fn from_definition(definition: QualityModelDefinition) -> EngineResult<Self> {
        let mut instance = Self {
            literature: BTreeMap::new(),
            entities: BTreeMap::new(),
            high_level_aspects: BTreeMap::new(),
            quality_aspects: BTreeMap::new(),
            product_factors: BTreeMap::new(),
            measures: BTreeMap::new(),
            impacts: Vec::new(),
            incoming: FxHashMap::default(),
            outgoing: FxHashMap::default(),
        };

        for source in definition.literature {
            let key = source.key.clone();
            insert_unique(&mut instance.literature, "literature", &key, source)?;
        }
        for entity in definition.entities {
            let id = entity.id.clone();
            insert_unique(&mut instance.entities, "entity", &id, entity)?;
        }
        for entity in instance.entities.values() {
            if let Some(relation) = &entity.relation {
                if !instance.entities.contains_key(&relation.entity) {
                    return Err(EngineError::not_found("Entity", &relation.entity));
                }
            }
        }

        for aspect in definition.high_level_aspects {
            let id = aspect.id.clone();
            insert_unique(&mut instance.high_level_aspects, "high-level aspect", &id, aspect)?;
        }
        for aspect in definition.quality_aspects {
            if !instance
                .high_level_aspects
                .contains_key(&aspect.high_level_aspect)
            {
                return Err(EngineError::not_found(
                    "HighLevelAspect",
                    &aspect.high_level_aspect,
                ));
            }
            let id = aspect.id.clone();
            insert_unique(&mut instance.quality_aspects, "quality aspect", &id, aspect)?;
        }

        for measure in definition.measures {
            for key in &measure.sources {
                if !instance.literature.contains_key(key) {
                    return Err(EngineError::not_found("Literature", key));
                }
            }
            let id = measure.id.clone();
            insert_unique(&mut instance.measures, "measure", &id, measure)?;
        }

        for factor in definition.product_factors {
            if instance.quality_aspects.contains_key(&factor.id) {
                return Err(EngineError::InvalidQualityModel(format!(
                    "id '{}' names both a product factor and a quality aspect",
                    factor.id
                )));
            }
            for measure_id in &factor.measures {
                if !instance.measures.contains_key(measure_id) {
                    return Err(EngineError::not_found("Measure", measure_id));
                }
            }
            for entity_id in &factor.relevant_entities {
                if !instance.entities.contains_key(entity_id) {
                    return Err(EngineError::not_found("Entity", entity_id));
                }
            }
            for key in &factor.sources {
                if !instance.literature.contains_key(key) {
                    return Err(EngineError::not_found("Literature", key));
                }
            }
            let id = factor.id.clone();
            insert_unique(&mut instance.product_factors, "product factor", &id, factor)?;
        }

        let mut seen_edges = HashSet::new();
        for raw in definition.impacts {
            if !instance.product_factors.contains_key(&raw.source) {
                return Err(EngineError::not_found("ProductFactor", &raw.source));
            }
            let target = if instance.product_factors.contains_key(&raw.target) {
                ImpactTarget::ProductFactor(raw.target.clone())
            } else if instance.quality_aspects.contains_key(&raw.target) {
                ImpactTarget::QualityAspect(raw.target.clone())
            } else {
                return Err(EngineError::not_found("ImpactTarget", &raw.target));
            };
            if raw.source == raw.target {
                return Err(EngineError::InvalidQualityModel(format!(
                    "factor '{}' impacts itself",
                    raw.source
                )));
            }
            if !seen_edges.insert((raw.source.clone(), raw.target.clone())) {
                return Err(EngineError::InvalidQualityModel(format!(
                    "duplicate impact {} -> {}",
                    raw.source, raw.target
                )));
            }

            let position = instance.impacts.len();
            instance
                .incoming
                .entry(raw.target.clone())
                .or_default()
                .push(position);
            instance
                .outgoing
                .entry(raw.source.clone())
                .or_default()
                .push(position);
            instance.impacts.push(Impact {
                source: raw.source,
                target,
                impact_type: raw.impact,
            });
        }

        debug!(
            "Quality model: {} aspects, {} factors, {} measures, {} impacts",
            instance.quality_aspects.len(),
            instance.product_factors.len(),
            instance.measures.len(),
            instance.impacts.len()
        );
        Ok(instance)
    }

    /// Replace the scale of one measure, e.g. from user configuration
    pub fn with_measure_scale(mut self, measure_id: &str, scale: MeasureScale) -> EngineResult<Self> {
        let measure = self
            .measures
            .get_mut(measure_id)
            .ok_or_else(|| EngineError::not_found("Measure", measure_id))?;
        measure.scale = scale;
        Ok(self)
    }

    // ==================== Catalog Access ====================

    pub fn literature(&self) -> &BTreeMap<String, LiteratureSource> {
        &self.literature
    }

    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    pub fn high_level_aspects(&self) -> &BTreeMap<String, HighLevelAspect> {
        &self.high_level_aspects
    }

    pub fn quality_aspects(&self) -> &BTreeMap<String, QualityAspect> {
        &self.quality_aspects
    }

    pub fn product_factors(&self) -> &BTreeMap<String, ProductFactor> {
        &self.product_factors
    }

    pub fn measures(&self) -> &BTreeMap<String, Measure> {
        &self.measures
    }

    pub fn impacts(&self) -> &[Impact] {
        &self.impacts
    }

    pub fn get_quality_aspect(&self, id: &str) -> EngineResult<&QualityAspect> {
        self.quality_aspects
            .get(id)
            .ok_or_else(|| EngineError::not_found("QualityAspect", id))
    }

    pub fn get_product_factor(&self, id: &str) -> EngineResult<&ProductFactor> {
        self.product_factors
            .get(id)
            .ok_or_else(|| EngineError::not_found("ProductFactor", id))
    }

    pub fn get_measure(&self, id: &str) -> EngineResult<&Measure> {
        self.measures
            .get(id)
            .ok_or_else(|| EngineError::not_found("Measure", id))
    }

    /// Quality aspects grouped under a high-level aspect
    pub fn aspects_of(&self, high_level_aspect_id: &str) -> Vec<&QualityAspect> {
        self.quality_aspects
            .values()
            .filter(|a| a.high_level_aspect == high_level_aspect_id)
            .collect()
    }

    /// Impacts landing on a factor or aspect
    pub fn incoming_impacts(&self, target_id: &str) -> Vec<&Impact> {
        self.incoming
            .get(target_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.impacts[i])
            .collect()
    }

    /// Impacts leaving a factor
    pub fn outgoing_impacts(&self, factor_id: &str) -> Vec<&Impact> {
        self.outgoing
            .get(factor_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.impacts[i])
            .collect()
    }

    /// Product factors owning a measure
    pub fn factors_owning_measure(&self, measure_id: &str) -> Vec<&ProductFactor> {
        self.product_factors
            .values()
            .filter(|f| f.measures.iter().any(|m| m == measure_id))
            .collect()
    }

    // ==================== Traversal ====================

    /// Fail with `NotFound` on any unknown aspect or factor id
    pub fn check_active(&self, aspects: &[String], factors: &[String]) -> EngineResult<()> {
        for id in aspects {
            self.get_quality_aspect(id)?;
        }
        for id in factors {
            self.get_product_factor(id)?;
        }
        Ok(())
    }

    /// Active factors plus every factor with an impact path into an active aspect or factor
    pub fn reachable_factors(&self, aspects: &[String], factors: &[String]) -> BTreeSet<String> {
        let mut reachable: BTreeSet<String> = factors
            .iter()
            .filter(|id| self.product_factors.contains_key(*id))
            .cloned()
            .collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = aspects
            .iter()
            .chain(factors.iter())
            .map(String::as_str)
            .collect();

        while let Some(target) = queue.pop_front() {
            if !visited.insert(target) {
                continue;
            }
            for impact in self.incoming_impacts(target) {
                reachable.insert(impact.source.clone());
                queue.push_back(impact.source.as_str());
            }
        }

        reachable
    }

    /// Aspects receiving at least one impact from the given factors
    pub fn aspects_impacted_by(&self, factors: &BTreeSet<String>) -> BTreeSet<String> {
        factors
            .iter()
            .flat_map(|f| self.outgoing_impacts(f))
            .filter_map(|impact| match &impact.target {
                ImpactTarget::QualityAspect(id) => Some(id.clone()),
                ImpactTarget::ProductFactor(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        [[high_level_aspects]]
        id = "reliability"
        name = "Reliability"

        [[quality_aspects]]
        id = "availability"
        name = "Availability"
        high_level_aspect = "reliability"

        [[quality_aspects]]
        id = "faultTolerance"
        name = "Fault Tolerance"
        high_level_aspect = "reliability"

        [[product_factors]]
        id = "replication"
        name = "Replication"
        measures = ["amountOfRedundancy"]

        [[product_factors]]
        id = "looseCoupling"
        name = "Loose coupling"

        [[product_factors]]
        id = "asynchronousCommunication"
        name = "Asynchronous communication"

        [[measures]]
        id = "amountOfRedundancy"
        name = "Amount of redundancy"
        scale = { type = "threshold", good = 3.0, bad = 1.0 }

        [[impacts]]
        source = "replication"
        target = "availability"
        impact = "positive"

        [[impacts]]
        source = "asynchronousCommunication"
        target = "looseCoupling"
        impact = "positive"

        [[impacts]]
        source = "looseCoupling"
        target = "faultTolerance"
        impact = "positive"

        [[impacts]]
        source = "looseCoupling"
        target = "asynchronousCommunication"
        impact = "neutral"
    "#;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let model = QualityModelInstance::builtin().unwrap();
        assert!(model.quality_aspects().contains_key("availability"));
        assert!(model.product_factors().contains_key("secureCommunication"));
        assert!(!model.impacts().is_empty());
        // every aspect belongs to a declared high-level aspect
        for aspect in model.quality_aspects().values() {
            assert!(model.high_level_aspects().contains_key(&aspect.high_level_aspect));
        }
    }

    #[test]
    fn test_incoming_index() {
        let model = QualityModelInstance::from_toml_str(SMALL).unwrap();
        let incoming = model.incoming_impacts("faultTolerance");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source, "looseCoupling");
        assert_eq!(
            model.outgoing_impacts("looseCoupling")[1].target,
            ImpactTarget::ProductFactor("asynchronousCommunication".into())
        );
    }

    #[test]
    fn test_reachable_factors_transitive_and_cyclic() {
        let model = QualityModelInstance::from_toml_str(SMALL).unwrap();

        let reachable = model.reachable_factors(&ids(&["faultTolerance"]), &[]);
        let expected: BTreeSet<String> =
            ids(&["asynchronousCommunication", "looseCoupling"]).into_iter().collect();
        assert_eq!(reachable, expected);

        let reachable = model.reachable_factors(&ids(&["availability"]), &[]);
        assert_eq!(reachable.len(), 1);
        assert!(reachable.contains("replication"));

        let reachable = model.reachable_factors(&[], &ids(&["replication"]));
        assert_eq!(reachable.len(), 1);
    }

    #[test]
    fn test_check_active_rejects_unknown_ids() {
        let model = QualityModelInstance::from_toml_str(SMALL).unwrap();
        assert!(model.check_active(&ids(&["availability"]), &[]).is_ok());
        let err = model.check_active(&ids(&["speed"]), &[]).unwrap_err();
        assert_eq!(err, EngineError::not_found("QualityAspect", "speed"));
        let err = model.check_active(&[], &ids(&["magic"])).unwrap_err();
        assert_eq!(err, EngineError::not_found("ProductFactor", "magic"));
    }

    #[test]
    fn test_unknown_impact_target_fails() {
        let broken = format!(
            "{}\n[[impacts]]\nsource = \"replication\"\ntarget = \"nowhere\"\nimpact = \"positive\"\n",
            SMALL
        );
        let err = QualityModelInstance::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { id, .. } if id == "nowhere"));
    }

    #[test]
    fn test_unknown_measure_fails() {
        let broken = SMALL.replace(
            "measures = [\"amountOfRedundancy\"]",
            "measures = [\"amountOfRedundancy\", \"ghost\"]",
        );
        let err = QualityModelInstance::from_toml_str(&broken).unwrap_err();
        assert_eq!(err, EngineError::not_found("Measure", "ghost"));
    }

    #[test]
    fn test_duplicate_factor_fails() {
        let broken = format!(
            "{}\n[[product_factors]]\nid = \"replication\"\nname = \"again\"\n",
            SMALL
        );
        let err = QualityModelInstance::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQualityModel(_)));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = QualityModelInstance::from_toml_str("[[impacts]\n").unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn test_measure_scale_override() {
        let model = QualityModelInstance::from_toml_str(SMALL)
            .unwrap()
            .with_measure_scale(
                "amountOfRedundancy",
                MeasureScale::Threshold { good: 5.0, bad: 2.0 },
            )
            .unwrap();
        assert_eq!(
            model.get_measure("amountOfRedundancy").unwrap().scale,
            MeasureScale::Threshold { good: 5.0, bad: 2.0 }
        );
    }
}
