use pfas_calc_core::{
    compute_result, Catalog, ComplianceStatus, Contaminant, CostIndex, Medium, ReceptorType,
    SiteInput,
};
use rust_decimal::Decimal;

const INDICES: [CostIndex; 2] = [CostIndex::Low, CostIndex::High];

fn quantities() -> Vec<Decimal> {
    vec![
        Decimal::ONE,
        Decimal::new(25, 1),
        Decimal::from(10_000),
        Decimal::from(1_000_000),
    ]
}

fn influent() -> Vec<(Contaminant, f64)> {
    vec![
        (Contaminant::Pfos, 3.2),
        (Contaminant::Pfoa, 10.0),
        (Contaminant::Pfhxs, 0.0),
        (Contaminant::Pfna, 0.45),
        (Contaminant::Pfbs, 7.5),
        (Contaminant::HfpoDa, 1.1),
    ]
}

fn site_for(medium: Medium, id: &str, quantity: Decimal) -> SiteInput {
    let base = influent().into_iter().fold(
        SiteInput::new(ReceptorType::DrinkingWater),
        |site, (c, v)| site.with_influent(c, v),
    );
    match medium {
        Medium::Water => base.with_water(quantity, Some(id)),
        Medium::Soil => base.with_soil(quantity, Some(id)),
    }
}

fn all_methods() -> Vec<(Medium, String)> {
    let catalog = Catalog::builtin().expect("builtin catalog");
    [Medium::Water, Medium::Soil]
        .into_iter()
        .flat_map(|medium| {
            catalog
                .methods(medium)
                .iter()
                .map(move |m| (medium, m.id.clone()))
        })
        .collect()
}

#[test]
fn zero_quantities_cost_nothing_and_leave_influent_untouched() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    for water in catalog.methods(Medium::Water) {
        for soil in catalog.methods(Medium::Soil) {
            for index in INDICES {
                let site = influent().into_iter().fold(
                    SiteInput::new(ReceptorType::DrinkingWater)
                        .with_water(Decimal::ZERO, Some(water.id.as_str()))
                        .with_soil(Decimal::ZERO, Some(soil.id.as_str())),
                    |site, (c, v)| site.with_influent(c, v),
                );
                let out = compute_result(&site, index).expect("estimate");
                assert_eq!(out.grand_total, Decimal::ZERO);
                assert_eq!(out.combined_residuals, site.influent_concentration);
            }
        }
    }
}

#[test]
fn worst_case_is_never_cheaper() {
    for (medium, id) in all_methods() {
        for quantity in quantities() {
            let site = site_for(medium, &id, quantity);
            let low = compute_result(&site, CostIndex::Low).expect("low");
            let high = compute_result(&site, CostIndex::High).expect("high");
            assert!(
                high.grand_total >= low.grand_total,
                "{id} at {quantity}: {} < {}",
                high.grand_total,
                low.grand_total
            );
        }
    }
}

#[test]
fn residuals_stay_between_zero_and_influent() {
    for (medium, id) in all_methods() {
        for index in INDICES {
            let site = site_for(medium, &id, Decimal::from(500));
            let out = compute_result(&site, index).expect("estimate");
            for (contaminant, influent) in &site.influent_concentration {
                for residual in [
                    out.water.residual(*contaminant),
                    out.soil.residual(*contaminant),
                    out.combined_residuals.get(contaminant).copied(),
                ] {
                    let residual = residual.expect("residual present");
                    assert!(residual >= 0.0 && residual <= *influent, "{id} {contaminant}");
                }
            }
        }
    }
}

#[test]
fn cost_lands_in_exactly_one_mechanism_bucket() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    for (medium, id) in all_methods() {
        let method = catalog.method(medium, &id).expect("method");
        let site = site_for(medium, &id, Decimal::from(1_000));
        let out = compute_result(&site, CostIndex::High).expect("estimate");
        let outcome = out.medium(medium);
        let expected = method.unit_cost_high * Decimal::from(1_000);
        assert_eq!(outcome.total_cost(), expected);
        assert!(outcome.removal_cost.is_zero() || outcome.destruction_cost.is_zero());
        assert_eq!(
            out.grand_total,
            out.total_removal() + out.total_destruction()
        );
    }
}

#[test]
fn hazard_index_is_sum_of_ratios() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    let site = site_for(Medium::Water, "ion-exchange", Decimal::from(2_000));
    let out = compute_result(&site, CostIndex::Low).expect("estimate");

    let expected = out
        .combined_residuals
        .iter()
        .map(|(c, r)| {
            r / catalog
                .threshold(ReceptorType::DrinkingWater, *c)
                .expect("threshold")
        })
        .sum::<f64>();
    assert!((out.hazard_index - expected).abs() < 1e-9);
}

#[test]
fn changing_one_residual_shifts_hazard_by_delta_over_threshold() {
    let base = SiteInput::new(ReceptorType::DrinkingWater)
        .with_influent(Contaminant::Pfos, 0.05)
        .with_influent(Contaminant::Pfoa, 0.1);
    let bumped = base.clone().with_influent(Contaminant::Pfoa, 0.3);

    let a = compute_result(&base, CostIndex::Low).expect("base");
    let b = compute_result(&bumped, CostIndex::Low).expect("bumped");
    let delta = 0.2 / 0.4;
    assert!((b.hazard_index - a.hazard_index - delta).abs() < 1e-9);
}

#[test]
fn single_contaminant_verdicts_coincide() {
    for concentration in [0.05, 0.1, 0.11, 2.0] {
        let site =
            SiteInput::new(ReceptorType::DrinkingWater).with_influent(Contaminant::Pfos, concentration);
        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        let row = out.compliance_for(Contaminant::Pfos).expect("row");
        assert_eq!(row.status, out.hazard_status);
    }
}

#[test]
fn any_exceedance_fails_the_aggregate() {
    let site = SiteInput::new(ReceptorType::Environmental)
        .with_influent(Contaminant::Pfos, 0.0)
        .with_influent(Contaminant::Pfoa, 1.5);
    let out = compute_result(&site, CostIndex::High).expect("estimate");
    assert!(!out.all_contaminants_pass());
    assert_eq!(out.hazard_status, ComplianceStatus::Exceeds);
}
