/// Prompt construction for the trading agent
///
/// The system prompt renders the live risk constraints so the model never
/// has to guess the limits; the user prompt drives one
/// analyze → decide → execute pass for a single instrument.
use crate::config::TradingMode;
use crate::risk::RiskGuard;
use crate::types::Symbol;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build_system_prompt(risk: &RiskGuard, mode: TradingMode) -> String {
        let whitelist: Vec<String> = risk.whitelist().iter().map(|s| s.to_string()).collect();

        let mut prompt = String::from(
            "You are an autonomous crypto futures trading agent. You analyze market data, \
             account state and recent news, then decide whether to open, close or hold \
             positions. You act only through the provided tools.\n\n",
        );

        prompt.push_str("=== Hard Risk Limits ===\n");
        prompt.push_str(&format!(
            "- Tradable symbols: {}\n",
            whitelist.join(", ")
        ));
        prompt.push_str(&format!("- Maximum leverage: {}x\n", risk.max_leverage()));
        prompt.push_str(&format!(
            "- Maximum cost per trade: {} USDT\n",
            risk.max_cost_per_trade()
        ));
        prompt.push_str(&format!("- Trading mode: {}\n\n", mode.as_str()));

        prompt.push_str(
            "=== Rules ===\n\
             - Every open MUST include a stop_loss price. Openings without protection are rejected downstream.\n\
             - Prefer small positions; never risk the full cost limit without strong conviction.\n\
             - Close positions that moved against the thesis instead of averaging down.\n\
             - When data is inconclusive, hold and explain why.\n\
             - After placing an order, read the account again before any further action.\n",
        );

        prompt
    }

    pub fn build_user_prompt(symbol: &Symbol) -> String {
        format!(
            "Run one trading cycle for {symbol}.\n\n\
             1. Fetch the market data for {symbol} and assess the current setup.\n\
             2. Check the account: balance, open positions, unrealized P&L.\n\
             3. Optionally search for recent news moving {base}.\n\
             4. Decide: open a long or short (with cost, leverage and stop_loss), \
             close an existing position, or hold.\n\
             5. Execute the decision via place_order, or do nothing for a hold.\n\n\
             Finish with a short summary of your reasoning and the action taken.",
            symbol = symbol,
            base = symbol.base(),
        )
    }
}
