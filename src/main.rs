use akg_store::StoreConfigBuilder;
use stress_test::{stress_test_commits, stress_test_scaling, HarnessResult};
use tracing_subscriber::EnvFilter;

fn main() -> HarnessResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())
}

async fn async_main() -> HarnessResult<()> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            ATTESTED COMMIT STRESS TESTS                     ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: few writers, clean batches
    let stats = stress_test_commits(Default::default(), 4, 50, 4, 0.0).await?;
    stats.print();

    // Test 2: more writers, some batches refused by domain rules
    let stats = stress_test_commits(Default::default(), 10, 100, 8, 0.1).await?;
    stats.print();

    // Test 3: large batches, hashed in parallel
    let stats = stress_test_commits(Default::default(), 4, 10, 200, 0.0).await?;
    stats.print();

    // Test 4: durable store, if a journal path is given
    if let Some(path) = std::env::var_os("AKG_JOURNAL") {
        let config = StoreConfigBuilder::new().path(path).build();
        let stats = stress_test_commits(config, 4, 50, 8, 0.05).await?;
        stats.print();
    }

    // Test 5: scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (writers)                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(16, 4).await?;

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
