use serde::{Deserialize, Serialize};

use crate::plan::types::{TestIdentifier, TestPlan};

/// A predicate over a test's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagPredicate {
    /// The tag is present.
    Include(String),
    Not(Box<TagPredicate>),
    And(Vec<TagPredicate>),
    Or(Vec<TagPredicate>),
    /// `any()`: at least one tag.
    AnyTag,
    /// `none()`: no tags at all.
    NoTag,
}

impl TagPredicate {
    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            Self::Include(tag) => tags.iter().any(|t| t == tag),
            Self::Not(inner) => !inner.matches(tags),
            Self::And(preds) => preds.iter().all(|p| p.matches(tags)),
            Self::Or(preds) => preds.iter().any(|p| p.matches(tags)),
            Self::AnyTag => !tags.is_empty(),
            Self::NoTag => tags.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        let token = match c {
            '!' => Token::Not,
            '&' => Token::And,
            '|' => Token::Or,
            '(' => Token::Open,
            ')' => Token::Close,
            ',' => return Err("',' is not allowed in a tag expression".to_owned()),
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            c if c.is_control() => {
                return Err("control character in tag expression".to_owned());
            }
            _ => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek()
                    && !is_reserved(c)
                {
                    tag.push(c);
                    chars.next();
                }
                tokens.push(Token::Tag(tag));
                continue;
            }
        };
        chars.next();
        tokens.push(token);
    }
    Ok(tokens)
}

fn is_reserved(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '!' | '&' | '|' | '(' | ')' | ',')
}

/// Recursive-descent parser over tag expression tokens. `!` binds tighter
/// than `&`, which binds tighter than `|`.
struct ExpressionParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExpressionParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<TagPredicate, String> {
        let mut operands = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.parse_and()?);
        }
        Ok(collapse(operands, TagPredicate::Or))
    }

    fn parse_and(&mut self) -> Result<TagPredicate, String> {
        let mut operands = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.parse_unary()?);
        }
        Ok(collapse(operands, TagPredicate::And))
    }

    fn parse_unary(&mut self) -> Result<TagPredicate, String> {
        match self.next() {
            Some(Token::Not) => Ok(TagPredicate::Not(Box::new(self.parse_unary()?))),
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_owned()),
                }
            }
            Some(Token::Tag(tag)) => {
                if matches!(tag.as_str(), "any" | "none") && self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    if self.next() != Some(Token::Close) {
                        return Err(format!("expected '{tag}()'"));
                    }
                    return Ok(if tag == "any" {
                        TagPredicate::AnyTag
                    } else {
                        TagPredicate::NoTag
                    });
                }
                Ok(TagPredicate::Include(tag))
            }
            Some(other) => Err(format!("unexpected {other:?} in tag expression")),
            None => Err("missing operand in tag expression".to_owned()),
        }
    }
}

fn collapse(
    mut operands: Vec<TagPredicate>,
    combine: fn(Vec<TagPredicate>) -> TagPredicate,
) -> TagPredicate {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        combine(operands)
    }
}

/// Parse a tag expression into a `TagPredicate`.
///
/// Supports tags, `!` (not), `&` (and), `|` (or), parentheses and the
/// `any()` / `none()` keywords, e.g. `(smoke | fast) & !flaky`.
///
/// # Errors
///
/// Returns an error for an empty expression, a missing operand, unbalanced
/// parentheses or a reserved character inside a tag.
pub fn parse_tag_expression(input: &str) -> Result<TagPredicate, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty tag expression".to_owned());
    }
    let mut parser = ExpressionParser { tokens, pos: 0 };
    let predicate = parser.parse_or()?;
    match parser.peek() {
        None => Ok(predicate),
        Some(token) => Err(format!("unexpected {token:?} after tag expression")),
    }
}

/// Splits a run across `num_shards` processes. The unit of sharding is a
/// leaf test or a dynamic container, whose run-time invocations all land in
/// the container's shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingFilter {
    pub num_shards: u32,
    pub shard_index: u32,
}

impl ShardingFilter {
    /// Build a filter from raw argument values. Anything unparsable or out of
    /// range disables sharding instead of failing the run.
    pub fn from_arguments(num_shards: Option<&str>, shard_index: Option<&str>) -> Option<Self> {
        let num_shards = num_shards?.trim().parse::<u32>().ok()?;
        let shard_index = shard_index?.trim().parse::<u32>().ok()?;
        (num_shards > 0 && shard_index < num_shards).then_some(Self {
            num_shards,
            shard_index,
        })
    }

    pub fn includes(&self, identifier: &TestIdentifier) -> bool {
        let bucket = string_hash(&identifier.unique_id).unsigned_abs() % self.num_shards;
        bucket == self.shard_index
    }
}

/// 32-bit `31 * h + c` hash over UTF-16 code units; stable across processes
/// so that every shard computes the same partition.
fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

/// A post-discovery filter applied to leaf tests and dynamic containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanFilter {
    Tags(TagPredicate),
    Shard(ShardingFilter),
}

impl PlanFilter {
    /// Whether the identifier survives this filter. Only filter units (leaf
    /// tests and dynamic containers) are judged; other containers always
    /// pass and are pruned separately once they end up without units.
    pub fn includes(&self, identifier: &TestIdentifier) -> bool {
        if !is_filter_unit(identifier) {
            return true;
        }
        match self {
            Self::Tags(predicate) => predicate.matches(&identifier.tags),
            Self::Shard(shard) => shard.includes(identifier),
        }
    }
}

/// Leaf tests and dynamic containers. A dynamic container known at
/// discovery time (a test template or factory) has no children yet; its
/// invocations appear at run time and follow the container.
fn is_filter_unit(identifier: &TestIdentifier) -> bool {
    identifier.is_test() || identifier.is_dynamic()
}

/// Parse generated filter directives, one per line: `-t <expr>` includes,
/// `-T <expr>` excludes. Unknown or malformed lines are skipped.
pub fn filters_from_lines(contents: &str) -> Vec<PlanFilter> {
    let mut filters = Vec::new();
    for line in contents.lines() {
        let line = line.trim_end();
        let (expression, include) = if let Some(rest) = line.strip_prefix("-t ") {
            (rest, true)
        } else if let Some(rest) = line.strip_prefix("-T ") {
            (rest, false)
        } else {
            continue;
        };
        match parse_tag_expression(expression) {
            Ok(predicate) if include => filters.push(PlanFilter::Tags(predicate)),
            Ok(predicate) => filters.push(PlanFilter::Tags(TagPredicate::Not(Box::new(predicate)))),
            Err(e) => tracing::debug!(line, error = %e, "skipping malformed filter directive"),
        }
    }
    filters
}

/// Keep only the filter units accepted by every filter, then drop containers
/// left without any unit below them. A retained dynamic container keeps its
/// whole subtree.
pub fn filter_plan(plan: &TestPlan, filters: &[PlanFilter]) -> TestPlan {
    let mut result = TestPlan::new();
    for root in plan.roots() {
        copy_retained(plan, root, filters, &mut result);
    }
    result
}

fn copy_retained(
    plan: &TestPlan,
    identifier: &TestIdentifier,
    filters: &[PlanFilter],
    into: &mut TestPlan,
) {
    if !retains(plan, identifier, filters) {
        return;
    }
    if identifier.is_dynamic() {
        copy_subtree(plan, identifier, into);
        return;
    }
    // Parents are copied before children, so `add` cannot fail here.
    if into.add(identifier.clone()).is_err() {
        return;
    }
    for child in plan.children(&identifier.unique_id) {
        copy_retained(plan, child, filters, into);
    }
}

fn copy_subtree(plan: &TestPlan, identifier: &TestIdentifier, into: &mut TestPlan) {
    if into.add(identifier.clone()).is_err() {
        return;
    }
    for child in plan.children(&identifier.unique_id) {
        copy_subtree(plan, child, into);
    }
}

fn retains(plan: &TestPlan, identifier: &TestIdentifier, filters: &[PlanFilter]) -> bool {
    if is_filter_unit(identifier) {
        return filters.iter().all(|f| f.includes(identifier));
    }
    plan.descendants(&identifier.unique_id)
        .into_iter()
        .filter(|d| is_filter_unit(d))
        .any(|d| filters.iter().all(|f| f.includes(d)))
}
