//! Primary, secondary and final energy.
use super::total;
use crate::formula::{FormulaDescriptor, FormulaEnv, FormulaOutputs, OutputVariable};
use crate::quantity::Grouping;
use crate::retrieve::Selection;
use anyhow::Result;
use indexmap::indexmap;

pub(crate) const COAL_PPL: [&str; 5] =
    ["coal_ppl", "coal_adv", "coal_adv_ccs", "igcc", "igcc_ccs"];
pub(crate) const GAS_PPL: [&str; 5] =
    ["gas_cc", "gas_ct", "gas_ppl", "gas_htfc", "gas_cc_ccs"];
pub(crate) const OIL_PPL: [&str; 3] = ["foil_ppl", "loil_ppl", "loil_cc"];
pub(crate) const BIO_PPL: [&str; 3] = ["bio_ppl", "bio_istig", "bio_istig_ccs"];
pub(crate) const NUC_PPL: [&str; 2] = ["nuc_lc", "nuc_hc"];
pub(crate) const HYDRO_PPL: [&str; 2] = ["hydro_lc", "hydro_hc"];
pub(crate) const WIND_PPL: [&str; 2] = ["wind_ppl", "wind_ppf"];
pub(crate) const SOLAR_PPL: [&str; 2] = ["solar_pv_ppl", "csp_sm1_ppl"];

/// Technologies blending biogas into the gas network
const BIOGAS: [&str; 1] = ["gas_bio"];

/// Final energy technologies in the industry sector
pub const INDUSTRY: [&str; 7] = [
    "coal_i", "foil_i", "loil_i", "gas_i", "elec_i", "biomass_i", "heat_i",
];
/// Final energy technologies in the residential and commercial sector
pub const RES_COM: [&str; 7] = [
    "coal_rc", "foil_rc", "loil_rc", "gas_rc", "elec_rc", "biomass_rc", "heat_rc",
];
/// Final energy technologies in the transport sector
pub const TRANSPORT: [&str; 5] = ["coal_trp", "foil_trp", "loil_trp", "gas_trp", "elec_trp"];

/// Primary energy by fuel
pub fn pe() -> FormulaDescriptor {
    FormulaDescriptor::new("pe", retr_pe)
        .unit("units_energy", "EJ/yr")
        .outputs(&[
            "Primary Energy",
            "Primary Energy|Coal",
            "Primary Energy|Gas",
            "Primary Energy|Oil",
            "Primary Energy|Biomass",
            "Primary Energy|Nuclear",
            "Primary Energy|Non-Biomass Renewables",
        ])
}

fn retr_pe(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_energy")?;
    let pp = env.pp();

    let coal = pp.extraction(&["coal", "lignite"], units, Grouping::Region)?;
    let gas = pp.extraction(&["gas"], units, Grouping::Region)?;
    let oil = pp.extraction(&["crude"], units, Grouping::Region)?;
    let biomass = pp.extraction(&["biomass"], units, Grouping::Region)?;

    // Direct equivalent: primary energy of non-combustion sources is their electricity output
    let electr = Selection::commodity(&["electr"], &["secondary"]);
    let nuclear = pp.out(&NUC_PPL, &electr, units, Grouping::Region)?;
    let renewables = [&HYDRO_PPL[..], &WIND_PPL[..], &SOLAR_PPL[..]].concat();
    let renewables = pp.out(&renewables, &electr, units, Grouping::Region)?;

    let parts = [&coal, &gas, &oil, &biomass, &nuclear, &renewables];
    Ok(indexmap! {
        "Primary Energy".into() => total(env.ctx(), "Primary Energy", units, parts),
        "Primary Energy|Coal".into() => OutputVariable::sum(coal),
        "Primary Energy|Gas".into() => OutputVariable::sum(gas),
        "Primary Energy|Oil".into() => OutputVariable::sum(oil),
        "Primary Energy|Biomass".into() => OutputVariable::sum(biomass),
        "Primary Energy|Nuclear".into() => OutputVariable::sum(nuclear),
        "Primary Energy|Non-Biomass Renewables".into() => OutputVariable::sum(renewables),
    })
}

/// Electricity generation by fuel.
///
/// Gas-fired generation is split into fossil and biogas parts according to the share of biogas in
/// the regional gas supply.
pub fn se_elec() -> FormulaDescriptor {
    FormulaDescriptor::new("se_elec", retr_se_elec)
        .unit("units_energy", "EJ/yr")
        .outputs(&[
            "Secondary Energy|Electricity",
            "Secondary Energy|Electricity|Coal",
            "Secondary Energy|Electricity|Gas",
            "Secondary Energy|Electricity|Oil",
            "Secondary Energy|Electricity|Biomass",
            "Secondary Energy|Electricity|Nuclear",
            "Secondary Energy|Electricity|Hydro",
            "Secondary Energy|Electricity|Wind",
            "Secondary Energy|Electricity|Solar",
        ])
}

fn retr_se_elec(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_energy")?;
    let pp = env.pp();
    let electr = Selection::commodity(&["electr"], &["secondary"]);
    let gen_elec = |technologies: &[&str]| pp.out(technologies, &electr, units, Grouping::Region);

    let coal = gen_elec(&COAL_PPL)?;
    let gas_total = gen_elec(&GAS_PPL)?;
    let oil = gen_elec(&OIL_PPL)?;
    let bio = gen_elec(&BIO_PPL)?;
    let nuclear = gen_elec(&NUC_PPL)?;
    let hydro = gen_elec(&HYDRO_PPL)?;
    let wind = gen_elec(&WIND_PPL)?;
    let solar = gen_elec(&SOLAR_PPL)?;

    let gas_secondary = Selection::commodity(&["gas"], &["secondary"]);
    let biogas = pp.out(&BIOGAS, &gas_secondary, units, Grouping::Region)?;
    let natural_gas = pp.extraction(&["gas"], units, Grouping::Region)?;
    let biogas_share = biogas.safe_div(&biogas.add(&natural_gas));

    let gas = gas_total.mul(&biogas_share.map_values(|share| 1.0 - share));
    let biomass = bio.add(&gas_total.mul(&biogas_share));

    let parts = [&coal, &gas, &oil, &biomass, &nuclear, &hydro, &wind, &solar];
    Ok(indexmap! {
        "Secondary Energy|Electricity".into() => total(
            env.ctx(),
            "Secondary Energy|Electricity",
            units,
            parts
        ),
        "Secondary Energy|Electricity|Coal".into() => OutputVariable::sum(coal),
        "Secondary Energy|Electricity|Gas".into() => OutputVariable::sum(gas),
        "Secondary Energy|Electricity|Oil".into() => OutputVariable::sum(oil),
        "Secondary Energy|Electricity|Biomass".into() => OutputVariable::sum(biomass),
        "Secondary Energy|Electricity|Nuclear".into() => OutputVariable::sum(nuclear),
        "Secondary Energy|Electricity|Hydro".into() => OutputVariable::sum(hydro),
        "Secondary Energy|Electricity|Wind".into() => OutputVariable::sum(wind),
        "Secondary Energy|Electricity|Solar".into() => OutputVariable::sum(solar),
    })
}

/// Final energy by sector
pub fn fe() -> FormulaDescriptor {
    FormulaDescriptor::new("fe", retr_fe)
        .unit("units_energy", "EJ/yr")
        .outputs(&[
            "Final Energy",
            "Final Energy|Industry",
            "Final Energy|Residential and Commercial",
            "Final Energy|Transportation",
        ])
}

fn retr_fe(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_energy")?;
    let pp = env.pp();
    let final_energy = Selection::commodity(&[], &["final"]);

    let industry = pp.inp(&INDUSTRY, &final_energy, units, Grouping::Region)?;
    let res_com = pp.inp(&RES_COM, &final_energy, units, Grouping::Region)?;
    let transport = pp.inp(&TRANSPORT, &final_energy, units, Grouping::Region)?;

    Ok(indexmap! {
        "Final Energy".into() => total(
            env.ctx(),
            "Final Energy",
            units,
            [&industry, &res_com, &transport]
        ),
        "Final Energy|Industry".into() => OutputVariable::sum(industry),
        "Final Energy|Residential and Commercial".into() => OutputVariable::sum(res_com),
        "Final Energy|Transportation".into() => OutputVariable::sum(transport),
    })
}
