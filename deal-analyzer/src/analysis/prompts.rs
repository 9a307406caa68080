//! Prompt templates keyed by investment family
//!
//! Extraction, quantitative and qualitative stages have dedicated templates for
//! real estate, business acquisitions and startups. Every other type falls
//! through to `Generic`.

use crate::analysis::types::InvestmentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    RealEstate,
    BusinessAcquisition,
    Startup,
    Generic,
}

impl From<InvestmentType> for TemplateFamily {
    fn from(investment_type: InvestmentType) -> Self {
        match investment_type {
            InvestmentType::RealEstate => TemplateFamily::RealEstate,
            InvestmentType::BusinessAcquisition => TemplateFamily::BusinessAcquisition,
            InvestmentType::Startup => TemplateFamily::Startup,
            InvestmentType::PublicEquity
            | InvestmentType::Bonds
            | InvestmentType::PrivateEquity
            | InvestmentType::Portfolio
            | InvestmentType::Other => TemplateFamily::Generic,
        }
    }
}

impl TemplateFamily {
    /// Keys stage 1 must report, either in `fields` or in `missing_fields`
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            TemplateFamily::RealEstate => &[
                "unit_count",
                "purchase_price",
                "price_per_unit",
                "rental_income",
                "occupancy_rate",
                "property_taxes",
                "management_fees",
                "location",
                "building_condition",
                "year_built",
                "financing_required",
            ],
            TemplateFamily::BusinessAcquisition => &[
                "annual_revenue",
                "ebitda",
                "net_income",
                "asking_price",
                "valuation_multiple",
                "employee_count",
                "key_assets",
                "existing_debt",
                "working_capital",
                "synergies",
                "reason_for_sale",
            ],
            TemplateFamily::Startup => &[
                "funding_stage",
                "previously_raised",
                "pre_money_valuation",
                "amount_requested",
                "dilution_pct",
                "recurring_revenue",
                "growth_rate_pct",
                "monthly_burn",
                "runway_months",
                "market_size",
                "founding_team",
                "traction",
            ],
            TemplateFamily::Generic => &[
                "investment_amount",
                "expected_return",
                "time_horizon",
                "structure",
                "collateral",
                "stated_risks",
            ],
        }
    }

    pub fn extraction_focus(self) -> &'static str {
        match self {
            TemplateFamily::RealEstate => {
                "REAL ESTATE DATA:
- Exact number of units
- Total and per-unit purchase price
- Rental income (monthly and annual)
- Occupancy rate
- Property taxes
- Management fees
- Precise location
- Building condition
- Year built
- Financing required"
            }
            TemplateFamily::BusinessAcquisition => {
                "BUSINESS DATA:
- Annual revenue (last 3 years)
- EBITDA and net income
- Asking price
- Valuation multiple applied (EV/EBITDA, P/E)
- Number of employees
- Key assets
- Existing debt
- Working capital required
- Potential synergies
- Reason for the sale"
            }
            TemplateFamily::Startup => {
                "STARTUP DATA:
- Stage (seed, series A/B/C)
- Amount previously raised
- Pre-money valuation
- Amount requested
- Dilution offered (%)
- Current revenue (MRR/ARR)
- Growth (%)
- Monthly burn rate
- Runway
- Market size (TAM/SAM/SOM)
- Founding team
- Traction (customers, revenue)"
            }
            TemplateFamily::Generic => {
                "GENERAL DATA:
- Investment amount required
- Expected return (ROI, IRR)
- Time horizon
- Investment structure
- Guarantees or collateral
- Risks mentioned"
            }
        }
    }

    pub fn quantitative_focus(self) -> &'static str {
        match self {
            TemplateFamily::RealEstate => {
                "You are a quantitative analyst specialised in real estate.

REQUIRED CALCULATIONS (show every formula):
1. 20-year DCF: annual cash flows, discount rate, terminal value, NPV
2. Cap rate = NOI / price x 100
3. Cash-on-cash return = annual cash flow / equity invested x 100
4. Debt service coverage ratio = NOI / debt service
5. Total ROI and payback period
6. IRR over 20 years

MANDATORY SCENARIOS:
- Pessimistic (80% occupancy, 1% growth, expenses +20%)
- Realistic (93% occupancy, 2.5% growth, normal expenses)
- Optimistic (98% occupancy, 4% growth, expenses -10%)

TABLE: year by year for 20 years (revenue, expenses, net cash flow, cumulative cash flow)"
            }
            TemplateFamily::BusinessAcquisition => {
                "You are an M&A quantitative analyst.

REQUIRED CALCULATIONS (full formulas):
1. DCF valuation: 10-year FCFF, WACC, terminal value, enterprise value
2. Market multiples: EV/EBITDA, P/E and EV/revenue against comparables
3. Returns: ROI at exit multiple, IRR over 5-7 years, cash-on-cash if leveraged
4. Synergies: revenue and cost synergies with their NPV
5. Solvency: debt/EBITDA, interest coverage, working capital needs

SCENARIOS: Pessimistic (-10% EBITDA), Base, Optimistic (+15% EBITDA)"
            }
            TemplateFamily::Startup => {
                "You are a venture capital quantitative analyst.

REQUIRED CALCULATIONS:
1. Valuation: post-money, dilution, ownership
2. Unit economics: CAC, LTV, LTV/CAC, CAC payback
3. Burn and runway: monthly burn, runway, months to breakeven
4. 5-year projection: MRR/ARR, year-over-year growth, path to profitability
5. Expected return: exit scenarios, multiple on money, IRR at a 5-7 year exit
6. Future dilution across expected rounds

SCENARIOS: Fail (total loss), Base (5x exit), Success (20x exit)"
            }
            TemplateFamily::Generic => {
                "GENERAL QUANTITATIVE ANALYSIS:
1. Net present value
2. Internal rate of return
3. Return on investment
4. Payback period
5. Solvency ratios
6. 5-10 year financial projections

SCENARIOS: Pessimistic, Realistic, Optimistic"
            }
        }
    }

    pub fn qualitative_focus(self) -> &'static str {
        match self {
            TemplateFamily::RealEstate => {
                "Analyse this property as a long-term value investor.

1. ECONOMIC MOAT: irreplaceable location, barriers to entry, durable advantages over 20+ years
2. ASSET QUALITY: construction state, technical obsolescence, improvement potential
3. LOCAL MARKET: demographics, economic development, infrastructure, long-term trends
4. MANAGEMENT: property manager quality, operating complexity
5. COMPETITIVE POSITION: comparison with similar properties, pricing power

No numbers, qualitative only."
            }
            TemplateFamily::BusinessAcquisition => {
                "Analyse this acquisition as a long-term value investor.

1. ECONOMIC MOAT: brand, technology, network effects, cost advantages, switching costs
2. MANAGEMENT QUALITY: track record, integrity, capital allocation, alignment, retention after the deal
3. INDUSTRY: structural growth, disruption risk, bargaining power, competitive intensity
4. BUSINESS MODEL: recurring revenue, scalability, capital intensity, cyclicality
5. STRATEGY: clarity, execution history, growth options
6. REASON FOR SALE: red flag or opportunity?

Deep analysis, zero numbers."
            }
            TemplateFamily::Startup => {
                "Analyse this startup as a venture partner.

1. FOUNDING TEAM: relevant experience, track record, complementary skills, hiring ability
2. PRODUCT AND TECHNOLOGY: real innovation, intellectual property, product-market fit
3. MARKET: timing, size and growth, early adopter behaviour
4. POTENTIAL MOAT: network effects, switching costs, data, community
5. COMPETITION: who else, why this team wins
6. VISION: ambition, sequencing, long-term potential"
            }
            TemplateFamily::Generic => {
                "GENERAL QUALITATIVE ANALYSIS:
1. Quality of the assets or products
2. Competitive positioning
3. Market trends
4. Strategic risks
5. Growth opportunities

Zero numbers, purely qualitative."
            }
        }
    }
}

/// `mm:ss` rendering of a media offset
pub fn clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
