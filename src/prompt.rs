use crate::models::PromptContext;

pub const RECENT_VOCAB_LIMIT: usize = 10;
pub const COMMON_MISTAKES_LIMIT: usize = 5;

// 把模板里的占位符替换成上下文内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    recent_vocab_limit: usize,
    common_mistakes_limit: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        PromptBuilder {
            recent_vocab_limit: RECENT_VOCAB_LIMIT,
            common_mistakes_limit: COMMON_MISTAKES_LIMIT,
        }
    }
}

impl PromptBuilder {
    pub fn new(recent_vocab_limit: usize, common_mistakes_limit: usize) -> Self {
        PromptBuilder {
            recent_vocab_limit,
            common_mistakes_limit,
        }
    }

    // 单次扫描替换：替换结果不会再被展开，未知占位符原样保留
    pub fn build(&self, template: &str, context: &PromptContext) -> String {
        let mut output = String::with_capacity(template.len() + 256);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];

            let Some(close) = after_open.find('}') else {
                // 没有闭合的大括号，剩下的全部按字面输出
                output.push_str(&rest[open..]);
                return output;
            };

            let key = &after_open[..close];
            match self.lookup(key, context) {
                Some(value) => {
                    output.push_str(&value);
                    rest = &after_open[close + 1..];
                }
                None => {
                    // 只吃掉这个 '{'，后面可能还有合法的占位符，比如 "{ {language}"
                    output.push('{');
                    rest = after_open;
                }
            }
        }

        output.push_str(rest);
        output
    }

    fn lookup(&self, key: &str, context: &PromptContext) -> Option<String> {
        let value = match key {
            "language" => context.language.clone(),
            "level" => context.level.map(|level| level.to_string()).unwrap_or_default(),
            "level_band" => context
                .level
                .map(|level| level.band_label().to_string())
                .unwrap_or_default(),
            "topic" => context.topic.clone(),
            "native_language" => context.native_language.clone(),
            "recent_vocab" => join_limited(&context.recent_vocab, self.recent_vocab_limit, ", "),
            "common_mistakes" => join_limited(&context.common_mistakes, self.common_mistakes_limit, "; "),
            "correction_strategy" => context
                .correction
                .as_ref()
                .map(|strategy| strategy.instructions())
                .unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}

// 保持原有顺序，只取前 limit 个
fn join_limited(items: &[String], limit: usize, separator: &str) -> String {
    items
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn build(template: &str, context: &PromptContext) -> String {
    PromptBuilder::default().build(template, context)
}
