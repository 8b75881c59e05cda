use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};

mod config;
mod db;
mod engine;
mod llm;
mod utils;

use config::CONFIG;
use db::database::Database;
use db::models::{AssetCategory, GalleryCategory, ModelRow};
use engine::clients::ImageGenerationClient;
use engine::edit;
use engine::orchestrator;
use engine::planner;
use engine::prompt::AspectRatio;
use engine::styles::BrandStyle;
use engine::types::{ComposedPrompt, ReferenceImageSet, ShotBrief};
use llm::media;
use llm::GeminiClient;
use utils::logging::init_logging;
use utils::timing::{complete_command_timer, start_command_timer};

fn usage() -> &'static str {
    "Usage: apparel_studio <command> [options]\n\
     Commands:\n\
     \x20 add-model   --name <name> --face <path> --body <path> [--studio <id>]\n\
     \x20 add-asset   --category closet|location --name <name> --image <path> [--studio <id>]\n\
     \x20 list-assets [--studio <id>]\n\
     \x20 plan        --brief <text> [--moodboard <path>] [--min-shots <n>]\n\
     \x20 shoot       --brief <text> --model <name> --apparel <name> [--location <name>]\n\
     \x20             [--style minimalist|urban|luxury|pop] [--aspect 1:1|16:9|9:16]\n\
     \x20             [--moodboard <path>] [--min-shots <n>] [--no-plan] [--out <dir>]\n\
     \x20             [--studio <id>]\n\
     \x20 remix       --gallery-id <id> --instruction <text> [--reference <path>]\n\
     \x20             [--out <path>] [--studio <id>]\n\
     \x20 accessory   --gallery-id <id> --description <text> --image <path>\n\
     \x20             [--out <path>] [--studio <id>]"
}

fn flag_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

async fn load_prepared_image(path: &str) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image file {path}"))?;
    media::prepare_reference(&bytes, CONFIG.reference_max_dimension)
        .with_context(|| format!("failed to prepare image {path}"))
}

fn decode_stored_reference(value: &str) -> Result<Vec<u8>> {
    let bytes = media::decode_base64_image(value)?;
    media::prepare_reference(&bytes, CONFIG.reference_max_dimension)
}

/// Builds the reference set for a shoot from stored rows. Split face/body
/// references win over a legacy single model image.
fn build_reference_set(
    model: &ModelRow,
    apparel_base64: &str,
    location_base64: Option<&str>,
) -> Result<ReferenceImageSet> {
    let mut references = ReferenceImageSet::default();

    if let Some(face) = model.face_base64.as_deref().filter(|v| !v.trim().is_empty()) {
        references.model_face = Some(decode_stored_reference(face)?);
    }
    if let Some(body) = model.body_base64.as_deref().filter(|v| !v.trim().is_empty()) {
        references.model_body = Some(decode_stored_reference(body)?);
    }
    if references.model_face.is_none() && references.model_body.is_none() {
        if let Some(legacy) = model.image_base64.as_deref().filter(|v| !v.trim().is_empty()) {
            references.model_legacy = Some(decode_stored_reference(legacy)?);
        }
    }

    references.apparel = Some(decode_stored_reference(apparel_base64)?);
    if let Some(location) = location_base64 {
        references.location = Some(decode_stored_reference(location)?);
    }

    Ok(references)
}

async fn run_add_model(db: &Database, args: &[String]) -> Result<()> {
    let mut name = None;
    let mut face_path = None;
    let mut body_path = None;
    let mut studio_id = 1i64;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--name" => name = Some(flag_value(args, &mut index, "--name")?.to_string()),
            "--face" => face_path = Some(flag_value(args, &mut index, "--face")?.to_string()),
            "--body" => body_path = Some(flag_value(args, &mut index, "--body")?.to_string()),
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let name = name.ok_or_else(|| anyhow!("--name is required"))?;
    let face_path = face_path.ok_or_else(|| anyhow!("--face is required"))?;
    let body_path = body_path.ok_or_else(|| anyhow!("--body is required"))?;

    let face = load_prepared_image(&face_path).await?;
    let body = load_prepared_image(&body_path).await?;
    let id = db
        .add_model(
            studio_id,
            &name,
            &media::encode_base64(&face),
            &media::encode_base64(&body),
        )
        .await?;
    println!("Saved model '{name}' (id {id})");
    Ok(())
}

async fn run_add_asset(db: &Database, args: &[String]) -> Result<()> {
    let mut category = None;
    let mut name = None;
    let mut image_path = None;
    let mut studio_id = 1i64;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--category" => {
                let value = flag_value(args, &mut index, "--category")?;
                category = Some(
                    AssetCategory::parse(value)
                        .ok_or_else(|| anyhow!("Unknown asset category '{value}'"))?,
                );
            }
            "--name" => name = Some(flag_value(args, &mut index, "--name")?.to_string()),
            "--image" => image_path = Some(flag_value(args, &mut index, "--image")?.to_string()),
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let category = category.ok_or_else(|| anyhow!("--category is required"))?;
    let name = name.ok_or_else(|| anyhow!("--name is required"))?;
    let image_path = image_path.ok_or_else(|| anyhow!("--image is required"))?;

    let image = load_prepared_image(&image_path).await?;
    let id = db
        .add_asset(studio_id, category, &name, &media::encode_base64(&image))
        .await?;
    println!("Saved {} '{name}' (id {id})", category.as_str());
    Ok(())
}

async fn run_list_assets(db: &Database, args: &[String]) -> Result<()> {
    let mut studio_id = 1i64;
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    println!("Models:");
    for model in db.get_models(studio_id).await? {
        let kind = if model.face_base64.is_some() || model.body_base64.is_some() {
            "face+body"
        } else {
            "legacy"
        };
        println!("  [{}] {} ({kind})", model.id, model.name);
    }
    for category in [AssetCategory::Closet, AssetCategory::Location] {
        println!("{}:", category.as_str());
        for asset in db.get_assets(studio_id, category).await? {
            println!("  [{}] {}", asset.id, asset.name);
        }
    }
    for category in [GalleryCategory::Apparel, GalleryCategory::Accessory] {
        let items = db.get_gallery(studio_id, category).await?;
        println!("gallery/{}: {} item(s)", category.as_str(), items.len());
        for item in items {
            println!(
                "  [{}] {} | {}",
                item.id,
                item.created_at.format("%Y-%m-%d %H:%M"),
                truncate_chars(item.prompt.as_deref().unwrap_or(""), 60)
            );
        }
    }
    Ok(())
}

async fn run_plan(args: &[String]) -> Result<()> {
    let mut brief = None;
    let mut moodboard_path = None;
    let mut min_shots = CONFIG.min_shot_count;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--brief" => brief = Some(flag_value(args, &mut index, "--brief")?.to_string()),
            "--moodboard" => {
                moodboard_path = Some(flag_value(args, &mut index, "--moodboard")?.to_string())
            }
            "--min-shots" => {
                min_shots = flag_value(args, &mut index, "--min-shots")?
                    .parse::<usize>()
                    .context("Invalid --min-shots value")?
                    .max(1)
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let brief = brief.ok_or_else(|| anyhow!("--brief is required"))?;
    let moodboard = match moodboard_path {
        Some(path) => Some(load_prepared_image(&path).await?),
        None => None,
    };

    let client = GeminiClient::new();
    let outcome = planner::plan(&client, &brief, moodboard.as_deref(), min_shots).await;
    if outcome.degraded {
        println!("Note: planner collaborator unavailable; shot list is heuristic, not AI-assisted.");
    }
    for shot in &outcome.shots {
        match &shot.title {
            Some(title) => println!("Shot {} ({title}): {}", shot.index + 1, shot.description),
            None => println!("Shot {}: {}", shot.index + 1, shot.description),
        }
    }
    Ok(())
}

async fn run_shoot(db: &Database, args: &[String]) -> Result<()> {
    let mut brief = None;
    let mut model_name = None;
    let mut apparel_name = None;
    let mut location_name = None;
    let mut style = BrandStyle::Minimalist;
    let mut aspect_ratio = AspectRatio::Square;
    let mut moodboard_path = None;
    let mut min_shots = CONFIG.min_shot_count;
    let mut no_plan = false;
    let mut out_dir: Option<PathBuf> = None;
    let mut studio_id = 1i64;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--brief" => brief = Some(flag_value(args, &mut index, "--brief")?.to_string()),
            "--model" => model_name = Some(flag_value(args, &mut index, "--model")?.to_string()),
            "--apparel" => {
                apparel_name = Some(flag_value(args, &mut index, "--apparel")?.to_string())
            }
            "--location" => {
                location_name = Some(flag_value(args, &mut index, "--location")?.to_string())
            }
            "--style" => style = flag_value(args, &mut index, "--style")?.parse()?,
            "--aspect" => aspect_ratio = flag_value(args, &mut index, "--aspect")?.parse()?,
            "--moodboard" => {
                moodboard_path = Some(flag_value(args, &mut index, "--moodboard")?.to_string())
            }
            "--min-shots" => {
                min_shots = flag_value(args, &mut index, "--min-shots")?
                    .parse::<usize>()
                    .context("Invalid --min-shots value")?
                    .max(1)
            }
            "--no-plan" => no_plan = true,
            "--out" => {
                out_dir = Some(PathBuf::from(flag_value(args, &mut index, "--out")?))
            }
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let brief = brief.ok_or_else(|| anyhow!("--brief is required"))?;
    let model_name = model_name.ok_or_else(|| anyhow!("--model is required"))?;
    let apparel_name = apparel_name.ok_or_else(|| anyhow!("--apparel is required"))?;

    let model = db
        .get_model_by_name(studio_id, &model_name)
        .await?
        .ok_or_else(|| anyhow!("Model '{model_name}' not found"))?;
    let apparel = db
        .get_asset_by_name(studio_id, AssetCategory::Closet, &apparel_name)
        .await?
        .ok_or_else(|| anyhow!("Apparel '{apparel_name}' not found"))?;
    let location = match &location_name {
        Some(name) => Some(
            db.get_asset_by_name(studio_id, AssetCategory::Location, name)
                .await?
                .ok_or_else(|| anyhow!("Location '{name}' not found"))?,
        ),
        None => None,
    };

    let references = build_reference_set(
        &model,
        &apparel.image_base64,
        location.as_ref().map(|asset| asset.image_base64.as_str()),
    )?;
    // An attached location photo takes precedence over the style preset's
    // environment.
    let location_override = location.is_some();

    let client = GeminiClient::new();
    let shots: Vec<ShotBrief> = if no_plan {
        vec![ShotBrief::new(0, None, brief.clone())]
    } else {
        let moodboard = match &moodboard_path {
            Some(path) => Some(load_prepared_image(path).await?),
            None => None,
        };
        let outcome = planner::plan(&client, &brief, moodboard.as_deref(), min_shots).await;
        if outcome.degraded {
            println!(
                "Note: planner collaborator unavailable; shot list is heuristic, not AI-assisted."
            );
        }
        outcome.shots
    };

    println!("Shoot plan ({} shot(s)):", shots.len());
    for shot in &shots {
        println!("  Shot {}: {}", shot.index + 1, truncate_chars(&shot.description, 120));
    }

    let results = orchestrator::generate_shots(
        &client,
        &shots,
        &references,
        style,
        aspect_ratio,
        location_override,
    )
    .await?;

    if let Some(dir) = &out_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut completed = 0usize;
    for (shot, outcome) in &results {
        match outcome {
            Ok(artifact) => {
                completed += 1;
                db.add_gallery_item(
                    studio_id,
                    GalleryCategory::Apparel,
                    &truncate_chars(&shot.description, 100),
                    &media::encode_base64(&artifact.image_bytes),
                )
                .await?;
                if let Some(dir) = &out_dir {
                    let path = dir.join(format!("shot_{}.png", shot.index + 1));
                    tokio::fs::write(&path, &artifact.image_bytes).await?;
                    println!("Shot {} -> {}", shot.index + 1, path.display());
                } else {
                    println!("Shot {} complete (saved to gallery)", shot.index + 1);
                }
            }
            Err(err) => {
                let retry_hint = if err.is_retryable() { " (retryable)" } else { "" };
                println!("Shot {} failed: {err}{retry_hint}", shot.index + 1);
            }
        }
    }
    println!("{completed}/{} shot(s) completed", results.len());
    Ok(())
}

async fn run_remix(db: &Database, args: &[String]) -> Result<()> {
    let mut gallery_id = None;
    let mut instruction = None;
    let mut reference_path = None;
    let mut out_path: Option<PathBuf> = None;
    let mut studio_id = 1i64;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--gallery-id" => {
                gallery_id = Some(
                    flag_value(args, &mut index, "--gallery-id")?
                        .parse::<i64>()
                        .context("Invalid --gallery-id value")?,
                )
            }
            "--instruction" => {
                instruction = Some(flag_value(args, &mut index, "--instruction")?.to_string())
            }
            "--reference" => {
                reference_path = Some(flag_value(args, &mut index, "--reference")?.to_string())
            }
            "--out" => out_path = Some(PathBuf::from(flag_value(args, &mut index, "--out")?)),
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let gallery_id = gallery_id.ok_or_else(|| anyhow!("--gallery-id is required"))?;
    let instruction = instruction.ok_or_else(|| anyhow!("--instruction is required"))?;

    let item = db
        .get_gallery_item(gallery_id)
        .await?
        .ok_or_else(|| anyhow!("Gallery item {gallery_id} not found"))?;
    let base_image = media::decode_base64_image(&item.image_base64)?;

    let prompt = edit::remix(
        item.prompt.as_deref().unwrap_or("Existing fashion shoot"),
        &instruction,
    );
    let mut images = vec![base_image];
    if let Some(path) = &reference_path {
        images.push(load_prepared_image(path).await?);
    }

    let client = GeminiClient::new();
    let response = client.generate(&prompt, &images).await?;
    let artifact =
        orchestrator::artifact_from_response(0, ComposedPrompt::new(prompt), response)?;

    let category = GalleryCategory::parse(&item.category).unwrap_or(GalleryCategory::Apparel);
    let id = db
        .add_gallery_item(
            studio_id,
            category,
            &format!("Remix: {}", truncate_chars(&instruction, 90)),
            &media::encode_base64(&artifact.image_bytes),
        )
        .await?;
    if let Some(path) = &out_path {
        tokio::fs::write(path, &artifact.image_bytes).await?;
        println!("Remix saved to gallery (id {id}) and {}", path.display());
    } else {
        println!("Remix saved to gallery (id {id})");
    }
    Ok(())
}

async fn run_accessory(db: &Database, args: &[String]) -> Result<()> {
    let mut gallery_id = None;
    let mut description = None;
    let mut image_path = None;
    let mut out_path: Option<PathBuf> = None;
    let mut studio_id = 1i64;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--gallery-id" => {
                gallery_id = Some(
                    flag_value(args, &mut index, "--gallery-id")?
                        .parse::<i64>()
                        .context("Invalid --gallery-id value")?,
                )
            }
            "--description" => {
                description = Some(flag_value(args, &mut index, "--description")?.to_string())
            }
            "--image" => image_path = Some(flag_value(args, &mut index, "--image")?.to_string()),
            "--out" => out_path = Some(PathBuf::from(flag_value(args, &mut index, "--out")?)),
            "--studio" => {
                studio_id = flag_value(args, &mut index, "--studio")?
                    .parse()
                    .context("Invalid --studio value")?
            }
            other => return Err(anyhow!("Unknown option '{other}'\n{}", usage())),
        }
        index += 1;
    }

    let gallery_id = gallery_id.ok_or_else(|| anyhow!("--gallery-id is required"))?;
    let description = description.ok_or_else(|| anyhow!("--description is required"))?;
    let image_path = image_path.ok_or_else(|| anyhow!("--image is required"))?;

    let item = db
        .get_gallery_item(gallery_id)
        .await?
        .ok_or_else(|| anyhow!("Gallery item {gallery_id} not found"))?;
    let base_image = media::decode_base64_image(&item.image_base64)?;
    let accessory_image = load_prepared_image(&image_path).await?;

    let prompt = edit::insert_accessory("Existing fashion shoot", &description);
    let images = vec![base_image, accessory_image];

    let client = GeminiClient::new();
    let response = client.generate(&prompt, &images).await?;
    let artifact =
        orchestrator::artifact_from_response(0, ComposedPrompt::new(prompt), response)?;

    let id = db
        .add_gallery_item(
            studio_id,
            GalleryCategory::Accessory,
            &format!("Accessory Add: {}", truncate_chars(&description, 90)),
            &media::encode_base64(&artifact.image_bytes),
        )
        .await?;
    if let Some(path) = &out_path {
        tokio::fs::write(path, &artifact.image_bytes).await?;
        println!("Accessory shot saved to gallery (id {id}) and {}", path.display());
    } else {
        println!("Accessory shot saved to gallery (id {id})");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _logging_guards = init_logging();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).cloned() else {
        eprintln!("{}", usage());
        return Ok(());
    };

    let mut timer = start_command_timer(&command, args.get(2).cloned());
    let db = Database::init(&CONFIG.database_url).await?;
    info!("Running command '{command}'");

    let rest = &args[2..];
    let result = match command.as_str() {
        "add-model" => run_add_model(&db, rest).await,
        "add-asset" => run_add_asset(&db, rest).await,
        "list-assets" => run_list_assets(&db, rest).await,
        "plan" => run_plan(rest).await,
        "shoot" => run_shoot(&db, rest).await,
        "remix" => run_remix(&db, rest).await,
        "accessory" => run_accessory(&db, rest).await,
        other => Err(anyhow!("Unknown command '{other}'\n{}", usage())),
    };

    match &result {
        Ok(()) => complete_command_timer(&mut timer, "success"),
        Err(err) => {
            warn!("Command '{command}' failed: {err:#}");
            complete_command_timer(&mut timer, "error");
        }
    }
    result
}
