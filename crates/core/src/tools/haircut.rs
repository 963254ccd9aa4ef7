//! Salon calendar lookup used by the haircut appointment assistant.

use crate::error::ToolError;
use crate::tool::{Tool, ToolDefinition, parse_arguments};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

pub const TOOL_NAME: &str = "get_haircut_store_availability_for_location";

/// Arguments for the store availability lookup.
#[derive(Deserialize, JsonSchema, Debug)]
#[serde(deny_unknown_fields)]
pub struct HaircutStoreQuery {
    #[schemars(description = "The city where the haircut store is located")]
    pub city: String,
}

/// Reports the opening hours of the salon for a given city.
#[derive(Debug, Default, Clone)]
pub struct HaircutStoreCalendarTool;

#[async_trait]
impl Tool for HaircutStoreCalendarTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::for_arguments::<HaircutStoreQuery>(
            TOOL_NAME,
            "gets the availability for a location",
        )
    }

    async fn execute(&self, arguments: &str) -> Result<String, ToolError> {
        let query: HaircutStoreQuery = parse_arguments(arguments)?;
        let city = query.city.trim().to_lowercase();
        if city.is_empty() {
            return Err(ToolError::InvalidArguments("city must not be empty".into()));
        }
        info!(%city, tool = TOOL_NAME, "Executing tool");

        let availability = match city.as_str() {
            "paris" => "The haircut store in Paris is open from 9am to 6pm, Monday and Tuesday only.",
            _ => "There's no haircut store in this city, so we have no availability",
        };
        Ok(availability.to_string())
    }
}
