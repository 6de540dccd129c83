use crate::cli::{print_tag_table, ApproveArgs, MergeArgs, ResolveArgs, SearchArgs};
use crate::config::TagmeshConfig;
use crate::serve::open_service;
use anyhow::Result;

pub async fn resolve(args: ResolveArgs, config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    let resolution = service.resolve(&args.text).await?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    let tag = &resolution.canonical;
    println!("Tag:        {} ({})", tag.display_name, tag.id);
    println!("Slug:       {}", tag.slug);
    println!("Matched:    {}", resolution.matched_text);
    println!("Layer:      {:?}", resolution.layer);
    println!("New:        {}", resolution.is_new);
    println!("Similarity: {:.3}", resolution.similarity);
    Ok(())
}

pub async fn search(args: SearchArgs, config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    let hits = service
        .search(&args.query, args.limit, args.approved_only)
        .await?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print_tag_table(&hits);
    }
    Ok(())
}

pub fn merge(args: MergeArgs, config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    let outcome = service.merge(args.source, args.target)?;
    println!(
        "Merged {} into {} ({}): {} aliases moved",
        args.source, outcome.target.display_name, outcome.target.id, outcome.merged_alias_count
    );
    Ok(())
}

pub fn approve(args: ApproveArgs, config: TagmeshConfig) -> Result<()> {
    let service = open_service(&config)?;
    let tag = service.set_approval(args.id, !args.revoke)?;
    println!(
        "{} ({}) is now {}",
        tag.display_name,
        tag.id,
        if tag.is_approved { "approved" } else { "unapproved" }
    );
    Ok(())
}
