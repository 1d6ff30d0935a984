//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{SampleStore, SceneSummary};
use dispatcher::ChannelRegistry;
use serde::Serialize;
use tracing::info;

use super::source::{load_config, open_store};
use crate::cli::InfoArgs;

/// Dataset info for JSON output
#[derive(Serialize)]
struct StoreInfo {
    store: String,
    scenes: Vec<SceneSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensors: Vec<SensorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<TopicInfo>,
}

#[derive(Serialize)]
struct SensorInfo {
    name: String,
    modality: String,
}

#[derive(Serialize)]
struct TopicInfo {
    id: u32,
    topic: String,
    schema: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(args.source.config.as_deref())?;
    let store = open_store(&args.source, &config)?;
    info!(store = store.name(), "Describing sample store");

    let info = build_store_info(store.as_ref(), args);
    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize store info")?;
        println!("{}", json);
    } else {
        print_store_info(&info);
    }

    Ok(())
}

fn build_store_info(store: &dyn SampleStore, args: &InfoArgs) -> StoreInfo {
    let rig = store.sensors();

    let sensors = if args.sensors {
        rig.iter()
            .map(|(name, modality)| SensorInfo {
                name: name.clone(),
                modality: modality.as_str().to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let topics = if args.topics {
        ChannelRegistry::for_sensors(rig.iter().map(|(name, modality)| (name.as_str(), *modality)))
            .channels()
            .iter()
            .map(|spec| TopicInfo {
                id: spec.id,
                topic: spec.topic.to_string(),
                schema: spec.schema_name().to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };

    StoreInfo {
        store: store.name().to_string(),
        scenes: store.scenes(),
        sensors,
        topics,
    }
}

fn print_store_info(info: &StoreInfo) {
    println!("Store: {}", info.store);

    println!("\nScenes ({})", info.scenes.len());
    for (i, scene) in info.scenes.iter().enumerate() {
        let prefix = if i + 1 == info.scenes.len() { "└─" } else { "├─" };
        println!(
            "   {} #{} {} ({}) - {} keyframes",
            prefix, scene.index, scene.name, scene.id, scene.keyframe_count
        );
        if !scene.description.is_empty() {
            let child = if i + 1 == info.scenes.len() { "   " } else { "│  " };
            println!("   {}  {}", child, scene.description);
        }
    }

    if !info.sensors.is_empty() {
        println!("\nSensors ({})", info.sensors.len());
        for (i, sensor) in info.sensors.iter().enumerate() {
            let prefix = if i + 1 == info.sensors.len() { "└─" } else { "├─" };
            println!("   {} {} ({})", prefix, sensor.name, sensor.modality);
        }
    }

    if !info.topics.is_empty() {
        println!("\nTopics ({})", info.topics.len());
        for (i, topic) in info.topics.iter().enumerate() {
            let prefix = if i + 1 == info.topics.len() { "└─" } else { "├─" };
            println!("   {} [{}] {} <{}>", prefix, topic.id, topic.topic, topic.schema);
        }
    }

    println!();
}
