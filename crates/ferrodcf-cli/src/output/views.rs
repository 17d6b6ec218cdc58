use ferrodcf_core::valuation::{CostOfDebtSource, FcffPoint};
use ferrodcf_core::{SensitivityGrid, Valuation};

use super::table::{amount, optional, percent, price, Table};
use crate::inputs::{BetaSource, MarketAssumptions, RiskFreeSource};

pub fn valuation_tables(valuation: &Valuation, market: &MarketAssumptions) -> Vec<Table> {
    vec![
        inputs_table(valuation, market),
        summary_table(valuation),
        projection_table(valuation),
        fcff_table(&valuation.fcff_history),
    ]
}

fn inputs_table(valuation: &Valuation, market: &MarketAssumptions) -> Table {
    let wacc = &valuation.result.wacc;
    let assumptions = &valuation.assumptions;
    let mut table = Table::key_value(format!(
        "{} key inputs ({})",
        valuation.result.ticker, valuation.result.currency
    ));

    table.push_pair("Forecast horizon", format!("{} years", assumptions.horizon_years));
    table.push_pair("FCFF growth", percent(assumptions.fcff_growth));
    table.push_pair("Terminal growth", percent(assumptions.terminal_growth));
    table.push_pair(
        "Risk-free rate",
        format!(
            "{} ({})",
            percent(wacc.risk_free_rate),
            risk_free_label(&market.risk_free_source)
        ),
    );
    table.push_pair(
        "Beta",
        format!("{:.2} ({})", wacc.beta, beta_label(market.beta_source)),
    );
    table.push_pair("Market return", percent(market.market_return));
    table.push_pair("Equity risk premium", percent(wacc.equity_risk_premium));
    table.push_pair("Cost of equity", percent(wacc.cost_of_equity));
    table.push_pair(
        "Cost of debt (pre-tax)",
        format!(
            "{} ({})",
            percent(wacc.cost_of_debt),
            cost_of_debt_label(wacc.cost_of_debt_source)
        ),
    );
    table.push_pair("Tax rate", percent(wacc.tax_rate));
    table.push_pair("Market cap", amount(wacc.market_cap));
    table.push_pair(
        "Weights E / D",
        format!("{} / {}", percent(wacc.equity_weight), percent(wacc.debt_weight)),
    );
    table.push_pair("WACC", percent(wacc.wacc));
    table
}

fn summary_table(valuation: &Valuation) -> Table {
    let result = &valuation.result;
    let mut table = Table::key_value(format!("Valuation (base fiscal year {})", result.base_fiscal_year));
    table.push_pair("Base FCFF", amount(result.base_fcff.value));
    table.push_pair("PV of projected FCFF", amount(result.sum_discounted_fcff));
    table.push_pair("Terminal value", amount(result.terminal_value));
    table.push_pair("PV of terminal value", amount(result.discounted_terminal_value));
    table.push_pair("Enterprise value", amount(result.enterprise_value));
    table.push_pair("Total debt", amount(result.total_debt));
    table.push_pair("Cash", amount(result.cash));
    table.push_pair("Equity value", amount(result.equity_value));
    table.push_pair("Shares outstanding", amount(result.shares_outstanding));
    table.push_pair("Fair value per share", price(result.fair_value_per_share));
    table.push_pair("Market price", optional(result.market_price, price));
    table.push_pair("Upside", optional(result.upside, percent));
    table
}

fn projection_table(valuation: &Valuation) -> Table {
    let mut table = Table::new(
        "Projected FCFF",
        &["Year", "Fiscal year", "FCFF", "Discount factor", "Present value"],
    );
    for year in &valuation.projections {
        table.push_row(vec![
            year.year_offset.to_string(),
            year.fiscal_year.to_string(),
            amount(year.fcff),
            format!("{:.4}", year.discount_factor),
            amount(year.present_value),
        ]);
    }
    table
}

pub fn fcff_table(history: &[FcffPoint]) -> Table {
    let mut table = Table::new(
        "Historical FCFF",
        &["Fiscal year", "NOPAT", "D&A", "CapEx", "Change in NWC", "FCFF"],
    );
    for point in history {
        table.push_row(vec![
            point.fiscal_year.to_string(),
            amount(point.nopat),
            amount(point.depreciation_amortization),
            amount(point.capital_expenditure),
            amount(point.change_in_nwc),
            amount(point.fcff),
        ]);
    }
    table
}

/// Rows are WACC values, columns terminal growth values.
pub fn sensitivity_table(grid: &SensitivityGrid, currency: &str) -> Table {
    let mut headers = vec![String::from("WACC \\ g")];
    headers.extend(grid.terminal_growth_values.iter().map(|growth| percent(*growth)));

    let mut table = Table {
        title: format!("Fair value per share ({currency})"),
        headers,
        rows: Vec::new(),
    };
    for (wacc, row) in grid.wacc_values.iter().zip(&grid.fair_values) {
        let mut cells = vec![percent(*wacc)];
        cells.extend(row.iter().map(|cell| optional(*cell, price)));
        table.push_row(cells);
    }
    table
}

/// One-line result for interactive updates.
pub fn summary_line(valuation: &Valuation) -> String {
    let result = &valuation.result;
    let mut line = format!(
        "fair value {} {}/share | WACC {} | EV {}",
        price(result.fair_value_per_share),
        result.currency,
        percent(result.wacc.wacc),
        amount(result.enterprise_value)
    );
    if let Some(upside) = result.upside {
        line.push_str(&format!(" | upside {}", percent(upside)));
    }
    line
}

fn risk_free_label(source: &RiskFreeSource) -> String {
    match source {
        RiskFreeSource::Flag => String::from("flag"),
        RiskFreeSource::Config => String::from("config"),
        RiskFreeSource::Fred {
            series_id,
            observed_on,
        } => format!("FRED {series_id} {observed_on}"),
        RiskFreeSource::Fallback => String::from("fallback"),
    }
}

fn beta_label(source: BetaSource) -> &'static str {
    match source {
        BetaSource::Flag => "flag",
        BetaSource::Config => "config",
        BetaSource::Provider => "provider",
        BetaSource::Default => "default",
    }
}

fn cost_of_debt_label(source: CostOfDebtSource) -> &'static str {
    match source {
        CostOfDebtSource::Supplied => "supplied",
        CostOfDebtSource::InterestExpense => "interest / debt",
        CostOfDebtSource::Default => "default",
    }
}
