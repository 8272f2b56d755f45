//! Deterministic offline generator
//!
//! Used when no credential is configured, and to stand in for an analysis
//! the model could not deliver. Output depends only on the inputs.

use tracing::debug;

use crate::analysis::{AnalysisMode, AnalysisResult, detect_academic};
use crate::options::schema::{CustomOption, OTHER, OptionSchema, keys, option_with_sentinels};
use crate::options::{NATURAL_STYLE, NOT_SPECIFIED};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn logic_structure() -> CustomOption {
    option_with_sentinels(
        keys::LOGIC_STRUCTURE,
        "論理構造",
        "説明の構成方法",
        &[
            ("conclusion_first", "結論→理由→例"),
            ("three_points", "3ポイント整理"),
            ("pros_cons", "メリデメ比較"),
        ],
        Some("conclusion_first"),
        Some("conclusion_first"),
    )
}

fn general_options() -> Vec<CustomOption> {
    vec![
        logic_structure(),
        option_with_sentinels(
            keys::TONE,
            "トーン",
            "どんなトーンで説明するか",
            &[("friendly", "優しい"), ("neutral", "中立"), ("strict", "厳しい")],
            Some(NOT_SPECIFIED),
            None,
        ),
    ]
}

fn academic_options() -> Vec<CustomOption> {
    let mut length = option_with_sentinels(
        keys::LENGTH,
        "分量",
        "どのくらいの長さにするか",
        &[("short", "短め"), ("medium", "普通"), ("long", "長め")],
        Some(NOT_SPECIFIED),
        None,
    );
    if let Some(other) = length.values.iter_mut().find(|v| v.value == OTHER) {
        other.label = "その他（文字数指定など）".to_string();
    }

    vec![
        logic_structure(),
        option_with_sentinels(
            keys::WRITING_STYLE,
            "文体",
            "どんな文体で書いてほしいか",
            &[
                ("casual", "カジュアル"),
                ("standard", "標準"),
                ("formal", "フォーマル"),
                (NATURAL_STYLE, "AIが書いたとバレないように"),
            ],
            Some(NOT_SPECIFIED),
            Some(NATURAL_STYLE),
        ),
        option_with_sentinels(
            keys::TONE,
            "トーン",
            "どんなトーンで書いてほしいか",
            &[
                ("friendly", "優しい"),
                ("neutral", "中立"),
                ("strict", "厳しい"),
                ("academic", "大学レポート風"),
            ],
            Some(NOT_SPECIFIED),
            Some("academic"),
        ),
        option_with_sentinels(
            keys::TARGET_READER,
            "対象読者",
            "誰に向けて書くか",
            &[
                ("general", "一般"),
                ("expert", "専門家"),
                ("beginner", "初心者"),
                ("professor", "大学教授"),
            ],
            Some(NOT_SPECIFIED),
            Some("professor"),
        ),
        length,
    ]
}

/// Fixed analysis for a question
///
/// Quick mode yields a profile only. Detailed mode adds a two-option schema,
/// or the academic preset schema when the question reads like schoolwork.
pub fn fallback_analysis(question: &str, mode: AnalysisMode) -> AnalysisResult {
    debug!(?mode, "fallback_analysis: called");
    match mode {
        AnalysisMode::Quick => AnalysisResult {
            persona: "戦略コンサルタント".to_string(),
            method: "PREP法".to_string(),
            key_points: strings(&["論理的な構成", "具体例の提示", "説得力の強化"]),
            context: "効果的なコミュニケーション".to_string(),
            question_type: "一般的な質問".to_string(),
            option_schema: None,
        },
        AnalysisMode::Detailed => {
            let options = if detect_academic(question) {
                academic_options()
            } else {
                general_options()
            };
            AnalysisResult {
                persona: "問題解決コンサルタント".to_string(),
                method: "PREP法（結論→理由→例→結論）".to_string(),
                key_points: strings(&["具体的な状況の把握", "目的の明確化", "実行可能な提案"]),
                context: "ビジネスコミュニケーションにおける効果的なプレゼンテーション".to_string(),
                question_type: "提案・説得".to_string(),
                // Built from fixed data that always satisfies validation
                option_schema: OptionSchema::validate(options).ok(),
            }
        }
    }
}

/// Optimized prompt produced without a model
///
/// Quotes the question verbatim and folds in every fragment.
pub fn fallback_prompt(question: &str, analysis: &AnalysisResult, fragments: &[String]) -> String {
    debug!(fragment_count = fragments.len(), "fallback_prompt: called");
    let mut prompt = format!(
        "【あなたの役割】\n{persona}として回答してください。\n\n\
         【回答の構成】\n{method}の形式で構成してください。\n\
         1. まず結論を明確に述べる\n\
         2. その理由を2-3点挙げる\n\
         3. 具体的な例や実践方法を示す\n\
         4. 最後にもう一度結論を強調する\n\n\
         【重要な制約】\n\
         - 一般論で終わらせず、具体的なアクションまで示すこと\n\
         - 曖昧な表現を避け、明確な言葉を使うこと\n\
         - 確実な情報のみを提供し、推測で補わないこと\n\
         - 不確実な点や知らないことは、その旨を明示すること\n",
        persona = analysis.persona,
        method = analysis.method,
    );

    if !fragments.is_empty() {
        prompt.push_str("\n【ユーザーの希望】\n");
        for fragment in fragments {
            prompt.push_str(fragment);
            prompt.push('\n');
        }
    }

    if !analysis.key_points.is_empty() {
        prompt.push_str("\n【考慮すべきポイント】\n");
        for point in &analysis.key_points {
            prompt.push_str(&format!("- {}\n", point));
        }
    }

    prompt.push_str(&format!(
        "\n【元の質問】\n{}\n\n上記を踏まえて、具体的で実践的な回答をお願いします。",
        question
    ));
    prompt
}
