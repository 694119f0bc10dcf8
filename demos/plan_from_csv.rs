use sales_target_planner::{
    import_historical_str, Dimension, InMemoryTargetStore, IndexParameters, PlanAdjustment,
    PlanAdjustments, PlanConfig, PlanReport, ScenarioKind, TargetPlanner,
};

const HISTORY: &str = "\
ano;mes;loja;cidade;estado;venda_total
2024;1;Loja Batel;Curitiba;PR;118.400,00
2024;2;Loja Batel;Curitiba;PR;97.250,50
2024;3;Loja Batel;Curitiba;PR;104.900,00
2024;4;Loja Batel;Curitiba;PR;99.300,00
2024;5;Loja Batel;Curitiba;PR;121.000,00
2024;6;Loja Batel;Curitiba;PR;108.750,00
2024;7;Loja Batel;Curitiba;PR;101.200,00
2024;8;Loja Batel;Curitiba;PR;103.480,00
2024;9;Loja Batel;Curitiba;PR;100.010,00
2024;10;Loja Batel;Curitiba;PR;112.600,00
2024;11;Loja Batel;Curitiba;PR;139.900,00
2024;12;Loja Batel;Curitiba;PR;188.300,00
2024;1;Loja Centro;Londrina;PR;61.000,00
2024;2;Loja Centro;Londrina;PR;55.420,00
2024;3;Loja Centro;Londrina;PR;58.800,00
2024;4;Loja Centro;Londrina;PR;57.000,00
2024;5;Loja Centro;Londrina;PR;66.150,00
2024;6;Loja Centro;Londrina;PR;60.300,00
2024;7;Loja Centro;Londrina;PR;58.100,00
2024;8;Loja Centro;Londrina;PR;59.990,00
2024;9;Loja Centro;Londrina;PR;57.700,00
2024;10;Loja Centro;Londrina;PR;63.250,00
2024;11;Loja Centro;Londrina;PR;79.800,00
2024;12;Loja Centro;Londrina;PR;104.000,00
2024;12;Loja Joinville;Joinville;SC;12.500,00
";

fn main() {
    let import = import_historical_str(HISTORY).expect("history should parse");
    println!(
        "Imported {} rows ({} skipped)",
        import.records.len(),
        import.skipped
    );
    let series = import.into_series();

    let mut config = PlanConfig::new("Rede Sul");
    config.baseline_index = IndexParameters::new(0.045, 0.10, 0.30, 0.02);
    config.simulated_index = IndexParameters::new(0.060, 0.12, 0.30, 0.00);
    config.weights.dimension = Dimension::State;

    let mut pair =
        TargetPlanner::plan_with_verification(&series, &config).expect("plan should compute");

    let report = PlanReport::from_tree(&config.organization_name, pair.baseline.plan());
    println!("{}", report.to_markdown());
    println!("{}", pair.comparison().to_markdown(config.rounding));

    pair.simulated
        .apply(
            &series,
            &PlanAdjustments::new(vec![PlanAdjustment::SetGrowth {
                scenario: ScenarioKind::Simulated,
                value: 0.01,
            }]),
        )
        .expect("draft accepts adjustments");
    println!(
        "Simulated annual target after +1% growth: {}",
        pair.simulated.plan().annual.amount
    );

    let mut store = InMemoryTargetStore::new();
    let written = pair.baseline.lock(&mut store).expect("in-memory store accepts batch");
    println!("Locked baseline: {} store-month targets persisted", written);

    match report.to_csv() {
        Ok(csv) => println!("{}", csv.lines().take(4).collect::<Vec<_>>().join("\n")),
        Err(e) => eprintln!("CSV export failed: {}", e),
    }
}
