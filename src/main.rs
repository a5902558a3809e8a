use stress_test::{stress_test_cache_sizes, stress_test_sweeps};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    rt.block_on(async_main());
}

async fn async_main() {

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            COMPACTION STRESS TESTS                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: few writers, small key space
    let stats = stress_test_sweeps(4, 500, 16, 1000).await;
    stats.print();

    // Test 2: more writers, wider key space
    let stats = stress_test_sweeps(10, 2000, 200, 1000).await;
    stats.print();

    // Test 3: same load with a cache too small to help
    let stats = stress_test_sweeps(10, 2000, 200, 8).await;
    stats.print();

    // Test 4: cache size analysis
    stress_test_cache_sizes(20_000, 500, &[0, 16, 128, 1000, 10_000]).await;

    println!("\n✓ All stress tests completed successfully!");
}
