//! List command - enumerate evaluable entities per scope

use super::evaluate::load_system;
use super::Session;
use anyhow::Result;
use archqual::evaluation::EvaluationModelsWrapper;
use archqual::reporters::OutputFormat;
use console::style;
use serde_json::json;
use std::path::Path;

pub fn run(session: &Session, document: &Path, format: OutputFormat) -> Result<()> {
    let system = load_system(document)?;
    let (system_id, system_name) = (system.id.clone(), system.name.clone());
    let wrapper = EvaluationModelsWrapper::new(system, session.quality_model.clone());

    let sections = [
        ("components", wrapper.get_available_components()),
        ("infrastructure", wrapper.get_available_infrastructure()),
        ("request_traces", wrapper.get_available_request_traces()),
    ];

    match format {
        OutputFormat::Json => {
            let mut value = json!({ "system": { "id": system_id, "name": system_name } });
            for (section, entries) in &sections {
                value[*section] = entries
                    .iter()
                    .map(|(id, name)| json!({ "id": id, "name": name }))
                    .collect();
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!(
                "\n{} {} ({})",
                style("System:").bold(),
                system_id,
                style(&system_name).dim()
            );
            for (section, entries) in &sections {
                println!("\n{} ({})", style(section.to_uppercase()).bold(), entries.len());
                for (id, name) in entries {
                    println!("  {:<24} {}", id, style(name).dim());
                }
            }
        }
    }
    Ok(())
}
