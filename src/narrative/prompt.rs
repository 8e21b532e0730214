//! Prompt for the Sun / Moon / rising personality summary.

use crate::models::BigThree;

const TEMPLATE: &str = "你是一位專業且溫暖的占星師。請根據以下星盤配置，用【繁體中文】為案主撰寫性格分析。

【用詞規範】
提到星座時一律使用完整名稱（例如「巨蟹座」、「白羊座」、「水瓶座」），不可簡寫成「蟹座」、「羊座」、「瓶座」。

【星盤配置】
- 太陽：{sun}
- 月亮：{moon}
- 上升：{rising}

【輸出格式】
依下列格式輸出，以 Emoji 作為標題，不使用 Markdown：
🌟 【核心性格分析】
（太陽與上升的結合，約 100 字）
🌙 【內在情感需求】
（月亮的影響，約 80 字）
🎯 【給您的人生建議】
1. （建議一）
2. （建議二）
（一句溫暖的結語）
";

/// Fill the fixed instruction template with already-localized sign names.
pub fn build_prompt(signs: &BigThree) -> String {
    TEMPLATE
        .replace("{sun}", &signs.sun)
        .replace("{moon}", &signs.moon)
        .replace("{rising}", &signs.rising)
}
