//! Pure evaluator for the condition, update, key-condition, and
//! projection ASTs (§4.1). Nothing in this module suspends — per §5
//! the expression evaluator is the one component with no suspension
//! points at all.

use std::collections::{BTreeMap, BTreeSet};

use dynado_core::value::{add_decimal, compare_decimal, sub_decimal};
use dynado_core::{AttributeValue, Item};

use crate::ast::*;
use crate::error::EvaluationError;

type Result<T> = std::result::Result<T, EvaluationError>;

/// Placeholder substitution maps threaded through every evaluation
/// call, plus the item being evaluated against (`None` stands for a
/// non-existent item, as when a prepare request targets a brand new
/// key).
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext<'a> {
    pub item: Option<&'a Item>,
    pub names: &'a BTreeMap<String, String>,
    pub values: &'a BTreeMap<String, AttributeValue>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        item: Option<&'a Item>,
        names: &'a BTreeMap<String, String>,
        values: &'a BTreeMap<String, AttributeValue>,
    ) -> Self {
        EvaluationContext { item, names, values }
    }

    fn resolve_name<'p>(&self, path: &'p Path) -> Option<&'p str>
    where
        'a: 'p,
    {
        match path {
            Path::Name(n) => Some(n.as_str()),
            // An unresolved placeholder keeps its '#' prefix so it can
            // never collide with a real attribute name (§4.1).
            Path::Placeholder(p) => self.names.get(p).map(|s| s.as_str()),
        }
    }

    fn resolve_path(&self, path: &Path) -> Option<AttributeValue> {
        let name = self.resolve_name(path)?;
        self.item.and_then(|item| item.get(name)).cloned()
    }
}

/// Evaluates a condition AST to a boolean. Never returns an error for
/// unresolved *value* placeholders (they count as "undefined", which
/// is false under comparison); returns an error only for a structural
/// misuse such as `size(...)` used directly as a boolean atom.
pub fn eval_condition(node: &ConditionNode, ctx: &EvaluationContext) -> Result<bool> {
    match node {
        ConditionNode::And(a, b) => Ok(eval_condition(a, ctx)? && eval_condition(b, ctx)?),
        ConditionNode::Or(a, b) => Ok(eval_condition(a, ctx)? || eval_condition(b, ctx)?),
        ConditionNode::Not(a) => Ok(!eval_condition(a, ctx)?),
        ConditionNode::Function(call) => match eval_function(call, ctx)? {
            Some(AttributeValue::Bool(b)) => Ok(b),
            _ => Err(EvaluationError::TypeMismatch(
                "function does not evaluate to a boolean".to_string(),
            )),
        },
        ConditionNode::Compare { left, op, right } => {
            let l = eval_operand(left, ctx)?;
            let r = eval_operand(right, ctx)?;
            Ok(compare(l.as_ref(), *op, r.as_ref()))
        }
        ConditionNode::Between { operand, low, high } => {
            let v = eval_operand(operand, ctx)?;
            let lo = eval_operand(low, ctx)?;
            let hi = eval_operand(high, ctx)?;
            Ok(between(v.as_ref(), lo.as_ref(), hi.as_ref()))
        }
        ConditionNode::In { operand, values } => {
            let v = eval_operand(operand, ctx)?;
            let Some(v) = v else { return Ok(false) };
            for candidate in values {
                if let Some(c) = eval_operand(candidate, ctx)? {
                    if c.canonical_encode() == v.canonical_encode() {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
    }
}

/// Resolves an operand to a concrete value, or `None` for "undefined"
/// (an unresolved value placeholder, or a path that does not exist).
fn eval_operand(operand: &Operand, ctx: &EvaluationContext) -> Result<Option<AttributeValue>> {
    match operand {
        Operand::Path(path) => Ok(ctx.resolve_path(path)),
        Operand::Placeholder(name) => Ok(ctx.values.get(name).cloned()),
        Operand::NumberLiteral(n) => Ok(Some(AttributeValue::N(n.clone()))),
        Operand::StringLiteral(s) => Ok(Some(AttributeValue::S(s.clone()))),
        Operand::Function(call) => eval_function(call, ctx),
    }
}

fn eval_function(call: &FunctionCall, ctx: &EvaluationContext) -> Result<Option<AttributeValue>> {
    match call {
        FunctionCall::AttributeExists(path) => {
            Ok(Some(AttributeValue::Bool(ctx.resolve_path(path).is_some())))
        }
        FunctionCall::AttributeNotExists(path) => {
            Ok(Some(AttributeValue::Bool(ctx.resolve_path(path).is_none())))
        }
        FunctionCall::BeginsWith(a, b) => {
            let a = eval_operand(a, ctx)?;
            let b = eval_operand(b, ctx)?;
            let result = match (a, b) {
                (Some(AttributeValue::S(s)), Some(AttributeValue::S(prefix))) => {
                    s.starts_with(prefix.as_str())
                }
                _ => false,
            };
            Ok(Some(AttributeValue::Bool(result)))
        }
        FunctionCall::Contains(a, b) => {
            let a = eval_operand(a, ctx)?;
            let b = eval_operand(b, ctx)?;
            let result = match (a, b) {
                (Some(AttributeValue::S(s)), Some(AttributeValue::S(needle))) => {
                    s.contains(needle.as_str())
                }
                (Some(AttributeValue::L(items)), Some(needle)) => items
                    .iter()
                    .any(|item| item.canonical_encode() == needle.canonical_encode()),
                _ => false,
            };
            Ok(Some(AttributeValue::Bool(result)))
        }
        FunctionCall::AttributeType(a, b) => {
            let a = eval_operand(a, ctx)?;
            let b = eval_operand(b, ctx)?;
            let result = match (a, b) {
                (Some(value), Some(AttributeValue::S(tag))) => value.type_tag() == tag,
                _ => false,
            };
            Ok(Some(AttributeValue::Bool(result)))
        }
        FunctionCall::Size(a) => {
            let Some(value) = eval_operand(a, ctx)? else {
                return Ok(None);
            };
            match value.size() {
                Some(n) => Ok(Some(AttributeValue::N(n.to_string()))),
                None => Err(EvaluationError::TypeMismatch(format!(
                    "size() does not apply to type {}",
                    value.type_tag()
                ))),
            }
        }
        FunctionCall::IfNotExists(path_operand, default_operand) => {
            match eval_operand(path_operand, ctx)? {
                Some(value) => Ok(Some(value)),
                None => eval_operand(default_operand, ctx),
            }
        }
        FunctionCall::ListAppend(a, b) => {
            let a = eval_operand(a, ctx)?;
            let b = eval_operand(b, ctx)?;
            match (a, b) {
                (Some(AttributeValue::L(mut left)), Some(AttributeValue::L(right))) => {
                    left.extend(right);
                    Ok(Some(AttributeValue::L(left)))
                }
                _ => Err(EvaluationError::TypeMismatch(
                    "list_append() requires both operands to be lists".to_string(),
                )),
            }
        }
    }
}

fn compare(
    left: Option<&AttributeValue>,
    op: CompareOp,
    right: Option<&AttributeValue>,
) -> bool {
    // An undefined operand (unresolved value placeholder) is treated
    // as false under any comparison (§4.1).
    let (Some(l), Some(r)) = (left, right) else {
        return false;
    };
    match op {
        CompareOp::Eq => l.canonical_encode() == r.canonical_encode(),
        CompareOp::Ne => l.canonical_encode() != r.canonical_encode(),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = match (l, r) {
                (AttributeValue::N(a), AttributeValue::N(b)) => compare_decimal(a, b),
                (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(std::cmp::Ordering::Less) => matches!(op, CompareOp::Lt | CompareOp::Le),
                Some(std::cmp::Ordering::Equal) => matches!(op, CompareOp::Le | CompareOp::Ge),
                Some(std::cmp::Ordering::Greater) => matches!(op, CompareOp::Gt | CompareOp::Ge),
                None => false,
            }
        }
    }
}

fn between(
    value: Option<&AttributeValue>,
    low: Option<&AttributeValue>,
    high: Option<&AttributeValue>,
) -> bool {
    compare(value, CompareOp::Ge, low) && compare(value, CompareOp::Le, high)
}

/// Applies an update AST to `item`, producing the new item. Clauses
/// apply in the fixed order SET, REMOVE, ADD, DELETE; SET right-hand
/// sides read the original (pre-update) snapshot, while ADD/DELETE
/// read-modify-write the item as it stands after SET/REMOVE (§4.1).
pub fn apply_update(
    update: &UpdateExpression,
    item: &Item,
    names: &BTreeMap<String, String>,
    values: &BTreeMap<String, AttributeValue>,
) -> Result<Item> {
    let mut working = item.clone();
    let original_ctx = EvaluationContext::new(Some(item), names, values);

    for action in &update.set {
        let name = resolve_required_name(&action.path, names)?;
        let new_value = match &action.value {
            SetValue::Operand(operand) => required_value(operand, &original_ctx)?,
            SetValue::Arithmetic { left, op, right } => {
                let l = required_value(left, &original_ctx)?;
                let r = required_value(right, &original_ctx)?;
                let (AttributeValue::N(l), AttributeValue::N(r)) = (&l, &r) else {
                    return Err(EvaluationError::TypeMismatch(
                        "arithmetic in a SET action requires numeric operands".to_string(),
                    ));
                };
                let result = match op {
                    ArithOp::Plus => add_decimal(l, r),
                    ArithOp::Minus => sub_decimal(l, r),
                };
                AttributeValue::N(result.ok_or_else(|| {
                    EvaluationError::TypeMismatch("malformed decimal operand".to_string())
                })?)
            }
        };
        working.insert(name.to_string(), new_value);
    }

    for path in &update.remove {
        let name = resolve_required_name(path, names)?;
        working.remove(name);
    }

    for action in &update.add {
        let name = resolve_required_name(&action.path, names)?;
        let working_ctx = EvaluationContext::new(Some(&working), names, values);
        let addend = required_value(&action.value, &working_ctx)?;
        let current = working.get(name).cloned();
        let updated = apply_add(current, addend)?;
        working.insert(name.to_string(), updated);
    }

    for action in &update.delete {
        let name = resolve_required_name(&action.path, names)?;
        let working_ctx = EvaluationContext::new(Some(&working), names, values);
        let operand = required_value(&action.value, &working_ctx)?;
        match working.get(name).cloned() {
            None => {}
            Some(current) => {
                let updated = apply_delete(current, operand)?;
                working.insert(name.to_string(), updated);
            }
        }
    }

    Ok(working)
}

fn resolve_required_name<'a>(
    path: &'a Path,
    names: &'a BTreeMap<String, String>,
) -> Result<&'a str> {
    match path {
        Path::Name(n) => Ok(n.as_str()),
        Path::Placeholder(p) => names
            .get(p)
            .map(|s| s.as_str())
            .ok_or_else(|| EvaluationError::UnresolvedName(p.clone())),
    }
}

fn required_value(operand: &Operand, ctx: &EvaluationContext) -> Result<AttributeValue> {
    eval_operand(operand, ctx)?.ok_or_else(|| {
        EvaluationError::TypeMismatch("operand resolved to an undefined value".to_string())
    })
}

fn apply_add(current: Option<AttributeValue>, addend: AttributeValue) -> Result<AttributeValue> {
    match (current, addend) {
        (None, AttributeValue::N(n)) => {
            Ok(AttributeValue::N(add_decimal("0", &n).ok_or_else(|| {
                EvaluationError::TypeMismatch("malformed decimal operand".to_string())
            })?))
        }
        (Some(AttributeValue::N(cur)), AttributeValue::N(n)) => {
            Ok(AttributeValue::N(add_decimal(&cur, &n).ok_or_else(|| {
                EvaluationError::TypeMismatch("malformed decimal operand".to_string())
            })?))
        }
        (None, AttributeValue::SS(s)) => Ok(AttributeValue::SS(s)),
        (None, AttributeValue::NS(s)) => Ok(AttributeValue::NS(s)),
        (None, AttributeValue::BS(s)) => Ok(AttributeValue::BS(s)),
        (Some(AttributeValue::SS(mut cur)), AttributeValue::SS(addend)) => {
            cur.extend(addend);
            Ok(AttributeValue::SS(cur))
        }
        (Some(AttributeValue::NS(mut cur)), AttributeValue::NS(addend)) => {
            cur.extend(addend);
            Ok(AttributeValue::NS(cur))
        }
        (Some(AttributeValue::BS(mut cur)), AttributeValue::BS(addend)) => {
            cur.extend(addend);
            Ok(AttributeValue::BS(cur))
        }
        _ => Err(EvaluationError::TypeMismatch(
            "ADD requires a number or a matching set type".to_string(),
        )),
    }
}

fn apply_delete(current: AttributeValue, operand: AttributeValue) -> Result<AttributeValue> {
    match (current, operand) {
        (AttributeValue::SS(cur), AttributeValue::SS(remove)) => {
            Ok(AttributeValue::SS(diff(cur, remove)))
        }
        (AttributeValue::NS(cur), AttributeValue::NS(remove)) => {
            Ok(AttributeValue::NS(diff(cur, remove)))
        }
        (AttributeValue::BS(cur), AttributeValue::BS(remove)) => {
            Ok(AttributeValue::BS(diff(cur, remove)))
        }
        _ => Err(EvaluationError::TypeMismatch(
            "DELETE requires a set attribute and a matching set operand".to_string(),
        )),
    }
}

fn diff<T: Ord + Clone>(cur: BTreeSet<T>, remove: BTreeSet<T>) -> BTreeSet<T> {
    cur.difference(&remove).cloned().collect()
}

/// Projects `item` down to the attributes named by `expr`, resolving
/// any `#`-placeholders against `names`. A named attribute absent from
/// the item is simply omitted, matching DynamoDB's projection semantics.
pub fn apply_projection(
    expr: &ProjectionExpression,
    item: &Item,
    names: &BTreeMap<String, String>,
) -> Item {
    let mut projected = Item::new();
    for path in expr {
        let resolved = match path {
            Path::Name(n) => Some(n.as_str()),
            Path::Placeholder(p) => names.get(p).map(|s| s.as_str()),
        };
        if let Some(name) = resolved {
            if let Some(value) = item.get(name) {
                projected.insert(name.to_string(), value.clone());
            }
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn item_with(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn attribute_exists_and_not_exists_on_null_item() {
        let names = BTreeMap::new();
        let values = BTreeMap::new();
        let ctx = EvaluationContext::new(None, &names, &values);
        let exists = Parser::parse_condition("attribute_exists(id)").unwrap();
        let not_exists = Parser::parse_condition("attribute_not_exists(id)").unwrap();
        assert_eq!(eval_condition(&exists, &ctx).unwrap(), false);
        assert_eq!(eval_condition(&not_exists, &ctx).unwrap(), true);
    }

    #[test]
    fn comparison_is_numeric_when_both_sides_are_numbers() {
        let item = item_with(&[("v", AttributeValue::N("10".into()))]);
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("val".to_string(), AttributeValue::N("9".into()));
        let ctx = EvaluationContext::new(Some(&item), &names, &values);
        let cond = Parser::parse_condition("v > :val").unwrap();
        assert!(eval_condition(&cond, &ctx).unwrap());
    }

    #[test]
    fn unresolved_value_placeholder_is_false_under_comparison() {
        let item = item_with(&[("v", AttributeValue::N("10".into()))]);
        let names = BTreeMap::new();
        let values = BTreeMap::new(); // :val never supplied
        let ctx = EvaluationContext::new(Some(&item), &names, &values);
        let cond = Parser::parse_condition("v = :val").unwrap();
        assert!(!eval_condition(&cond, &ctx).unwrap());
    }

    #[test]
    fn between_and_in_work_on_numbers() {
        let item = item_with(&[("ts", AttributeValue::N("300".into()))]);
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("lo".to_string(), AttributeValue::N("200".into()));
        values.insert("hi".to_string(), AttributeValue::N("400".into()));
        let ctx = EvaluationContext::new(Some(&item), &names, &values);
        let cond = Parser::parse_condition("ts BETWEEN :lo AND :hi").unwrap();
        assert!(eval_condition(&cond, &ctx).unwrap());
    }

    #[test]
    fn begins_with_applies_only_to_strings() {
        let item = item_with(&[("name", AttributeValue::S("hello".into()))]);
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("p".to_string(), AttributeValue::S("he".into()));
        let ctx = EvaluationContext::new(Some(&item), &names, &values);
        let cond = Parser::parse_condition("begins_with(name, :p)").unwrap();
        assert!(eval_condition(&cond, &ctx).unwrap());
    }

    #[test]
    fn size_as_boolean_atom_is_a_type_mismatch() {
        let item = item_with(&[("l", AttributeValue::L(vec![]))]);
        let names = BTreeMap::new();
        let values = BTreeMap::new();
        let ctx = EvaluationContext::new(Some(&item), &names, &values);
        let cond = Parser::parse_condition("size(l)").unwrap();
        assert!(matches!(
            eval_condition(&cond, &ctx),
            Err(EvaluationError::TypeMismatch(_))
        ));
    }

    #[test]
    fn apply_update_runs_clauses_in_set_remove_add_delete_order() {
        let item = item_with(&[
            ("keep_removed", AttributeValue::S("x".into())),
            ("counter", AttributeValue::N("1".into())),
            ("tags", AttributeValue::SS(BTreeSet::from(["a".to_string(), "b".to_string()]))),
        ]);
        let update =
            Parser::parse_update("DELETE tags :rm ADD counter :one SET fresh = :v REMOVE keep_removed")
                .unwrap();
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("v".to_string(), AttributeValue::S("new".into()));
        values.insert("one".to_string(), AttributeValue::N("1".into()));
        values.insert("rm".to_string(), AttributeValue::SS(BTreeSet::from(["a".to_string()])));

        let result = apply_update(&update, &item, &names, &values).unwrap();
        assert!(!result.contains_key("keep_removed"));
        assert_eq!(result.get("fresh"), Some(&AttributeValue::S("new".into())));
        assert_eq!(result.get("counter"), Some(&AttributeValue::N("2".into())));
        assert_eq!(
            result.get("tags"),
            Some(&AttributeValue::SS(BTreeSet::from(["b".to_string()])))
        );
    }

    #[test]
    fn add_on_missing_numeric_attribute_initializes_to_zero_plus_addend() {
        let item = Item::new();
        let update = Parser::parse_update("ADD score :n").unwrap();
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("n".to_string(), AttributeValue::N("5".into()));
        let result = apply_update(&update, &item, &names, &values).unwrap();
        assert_eq!(result.get("score"), Some(&AttributeValue::N("5".into())));
    }

    #[test]
    fn arithmetic_on_missing_operand_fails_the_action() {
        let item = Item::new();
        let update = Parser::parse_update("SET v = missing + :one").unwrap();
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("one".to_string(), AttributeValue::N("1".into()));
        let result = apply_update(&update, &item, &names, &values);
        assert!(matches!(result, Err(EvaluationError::TypeMismatch(_))));
    }

    #[test]
    fn if_not_exists_prefers_current_value() {
        let item = item_with(&[("v", AttributeValue::N("7".into()))]);
        let update = Parser::parse_update("SET v = if_not_exists(v, :d)").unwrap();
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert("d".to_string(), AttributeValue::N("0".into()));
        let result = apply_update(&update, &item, &names, &values).unwrap();
        assert_eq!(result.get("v"), Some(&AttributeValue::N("7".into())));
    }

    #[test]
    fn projection_keeps_only_named_attributes_and_skips_missing_ones() {
        let item = item_with(&[
            ("id", AttributeValue::S("a".into())),
            ("secret", AttributeValue::S("x".into())),
        ]);
        let expr = Parser::parse_projection("id, missing").unwrap();
        let mut names = BTreeMap::new();
        names.insert("#ignored".to_string(), "unused".to_string());
        let projected = apply_projection(&expr, &item, &names);
        assert_eq!(projected.get("id"), Some(&AttributeValue::S("a".into())));
        assert!(!projected.contains_key("secret"));
        assert!(!projected.contains_key("missing"));
    }

    #[test]
    fn list_append_concatenates() {
        let item = item_with(&[(
            "l",
            AttributeValue::L(vec![AttributeValue::N("1".into())]),
        )]);
        let update = Parser::parse_update("SET l = list_append(l, :more)").unwrap();
        let names = BTreeMap::new();
        let mut values = BTreeMap::new();
        values.insert(
            "more".to_string(),
            AttributeValue::L(vec![AttributeValue::N("2".into())]),
        );
        let result = apply_update(&update, &item, &names, &values).unwrap();
        assert_eq!(
            result.get("l"),
            Some(&AttributeValue::L(vec![
                AttributeValue::N("1".into()),
                AttributeValue::N("2".into())
            ]))
        );
    }
}
