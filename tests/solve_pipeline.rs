use blank_slate_ubi::core::{
    Band, BandTotals, EvolutionConfig, LossContext, LossOptions, SolveConfig, UnitRecord,
    UnitTable, equal_split, solve, total_disbursement,
};
use blank_slate_ubi::dataset::DatasetCache;
use blank_slate_ubi::policy::{FundingReform, PolicyFile};

fn unit(baseline: f64, funded: f64, counts: [u32; 5], weight: f64) -> UnitRecord {
    UnitRecord {
        baseline_net_income: baseline,
        funded_net_income: funded,
        count_young_child: counts[0],
        count_older_child: counts[1],
        count_young_adult: counts[2],
        count_adult: counts[3],
        count_senior: counts[4],
        count_person: counts.iter().sum(),
        weight,
    }
}

fn sample_table() -> UnitTable {
    UnitTable::new(vec![
        unit(50_000.0, 40_000.0, [0, 0, 0, 1, 0], 1.0),
        unit(30_000.0, 28_000.0, [1, 0, 0, 1, 0], 1.0),
        unit(20_000.0, 10_000.0, [0, 0, 0, 0, 1], 1.0),
    ])
    .expect("valid table")
}

fn search_config() -> SolveConfig {
    SolveConfig {
        evolution: EvolutionConfig {
            max_generations: 300,
            seed: Some(2024),
            ..EvolutionConfig::default()
        },
        ..SolveConfig::with_upper_bound(30_000.0)
    }
}

#[test]
fn cached_table_solves_to_a_balanced_policy_that_beats_equal_split() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = DatasetCache::new(dir.path().join("data").join("units.csv.gz"));
    let table = cache
        .load_or_generate(|| Ok(sample_table()))
        .expect("generated table");
    assert_eq!(cache.load().expect("cached table"), table);

    let ctx = LossContext::new(table, LossOptions::default()).expect("context");
    assert_eq!(ctx.funding_pool(), 22_000.0);

    let result = solve(&ctx, &search_config()).expect("solve");
    let spent = total_disbursement(&result.amounts, &BandTotals::from_table(ctx.table()));
    assert!(
        (spent - ctx.funding_pool()).abs() < 1e-6,
        "spent {spent}, pool {}",
        ctx.funding_pool()
    );

    let equal = equal_split(&ctx);
    assert_eq!(equal.amount, 5_500.0);
    assert!((equal.loss - 0.07875).abs() < 1e-12);
    assert!(
        result.loss < equal.loss,
        "optimized {} vs equal {}",
        result.loss,
        equal.loss
    );
    assert!(result.within_sanity_threshold);
}

#[test]
fn solved_policy_persists_rounded_amounts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = LossContext::new(sample_table(), LossOptions::default()).expect("context");
    let result = solve(&ctx, &search_config()).expect("solve");

    let path = dir.path().join("policy.yaml");
    PolicyFile::new(&result.amounts, FundingReform::default())
        .save(&path)
        .expect("saved");
    let loaded = PolicyFile::load(&path).expect("loaded");

    let restored = loaded.policy.to_amounts();
    for band in Band::ALL {
        assert!((restored.get(band) - result.amounts.get(band)).abs() <= 0.5);
    }
    assert_eq!(loaded.reform().senior_bi_amount, loaded.policy.senior_amount);
}

#[test]
fn seeded_solves_are_reproducible() {
    let ctx = LossContext::new(sample_table(), LossOptions::default()).expect("context");
    let first = solve(&ctx, &search_config()).expect("first");
    let second = solve(&ctx, &search_config()).expect("second");
    assert_eq!(first.amounts, second.amounts);
    assert_eq!(first.loss, second.loss);
}
