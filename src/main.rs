// Users database demo - seeds a small graph and prints it fully populated

use tracing::info;
use tracing_subscriber::EnvFilter;

use users_db::{
    config::Config,
    data_seeder::seed_sample_graph,
    ent_framework::{EntContext, Entity, PopulateSpec},
    entities::{EntUser, EntityType},
    infrastructure::Filter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let ctx = EntContext::from_config(&config).await?;

    let graph = seed_sample_graph(&ctx).await?;
    info!(
        "{} has {} post(s)",
        graph.user.name.as_deref().unwrap_or_default(),
        graph.user.post_count()
    );

    let full_graph = PopulateSpec::path("blogPosts").populate(
        PopulateSpec::path("comments")
            .model(EntityType::Comment)
            .populate(PopulateSpec::path("user").model(EntityType::User)),
    );
    if let Some(user) = EntUser::find_one_populated(&ctx, Filter::eq("name", "Joe"), &[full_graph]).await? {
        info!("Populated graph: {:#?}", user);
    }

    ctx.shutdown().await;
    Ok(())
}
