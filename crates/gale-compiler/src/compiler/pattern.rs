//! Match Pattern Lowering
//!
//! A pattern lowers to boolean code folded into `previous`, the running test
//! of its branch. Alternatives of one branch are OR-ed into it; sub-patterns of
//! an array or dictionary are AND-ed, so element reads only run while every
//! earlier check held.

use super::function::FunctionCompiler;
use crate::ast::{BinaryOp, DictionaryPatternEntry, Pattern};
use crate::emitter::Address;
use crate::error::{CompileError, CompileResult};
use crate::types::{Constant, DataType, VariantType};

impl<'a> FunctionCompiler<'a> {
    /// Lower `pattern` against `value` whose runtime type tag is in `type_addr`
    pub(super) fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        value: &Address,
        type_addr: &Address,
        previous: &Address,
        is_first: bool,
        is_nested: bool,
    ) -> CompileResult<()> {
        match pattern {
            Pattern::Literal(literal) => {
                self.open_pattern(previous, is_first, is_nested);
                let kind = literal.variant_type();
                let expected = Address::constant(literal.clone());
                let tag = Address::constant(Constant::Int(kind.tag()));
                self.compare_value(value, type_addr, &expected, &tag, kind, previous, is_first, is_nested);
            }
            Pattern::Expression(expr) => {
                self.open_pattern(previous, is_first, is_nested);
                let expected = self.lower_expr(expr)?;
                let (tag, kind) = match expected.constant_value() {
                    Some(constant) => {
                        let kind = constant.variant_type();
                        (Address::constant(Constant::Int(kind.tag())), kind)
                    }
                    None => {
                        let tag = self.add_temporary(&DataType::int());
                        self.emitter.write_typeof(&tag, &expected);
                        (tag, expr.ty.variant_type().unwrap_or(VariantType::Nil))
                    }
                };
                self.compare_value(value, type_addr, &expected, &tag, kind, previous, is_first, is_nested);
                self.release(&tag);
                self.release(&expected);
            }
            Pattern::Bind(name) => {
                self.open_pattern(previous, is_first, is_nested);
                let Some(bind) = self.scope.local(name).cloned() else {
                    return Err(CompileError::internal(format!("pattern binding {} is not declared", name), self.pos()));
                };
                self.emitter.write_assign(&bind, value);
                self.match_anything(previous, is_first, is_nested);
            }
            Pattern::Wildcard => {
                self.open_pattern(previous, is_first, is_nested);
                self.match_anything(previous, is_first, is_nested);
            }
            Pattern::Array(items) => {
                self.open_pattern(previous, is_first, is_nested);
                let has_rest = matches!(items.last(), Some(Pattern::Rest));
                let fixed = items.len() - usize::from(has_rest);
                let result = self.test_container(value, type_addr, VariantType::Array, fixed, has_rest);

                for (index, item) in items[..fixed].iter().enumerate() {
                    if matches!(item, Pattern::Rest) {
                        return Err(CompileError::internal("`..` before the end of an array pattern", self.pos()));
                    }
                    self.emitter.write_and_left_operand(&result);
                    let key = Address::constant(Constant::Int(index as i64));
                    self.lower_element(item, value, &key, &result)?;
                    self.emitter.write_and_right_operand(&result);
                    self.emitter.write_end_and(&result);
                }

                self.close_pattern(&result, previous, is_first, is_nested);
                self.release(&result);
            }
            Pattern::Dictionary(entries) => {
                self.open_pattern(previous, is_first, is_nested);
                let has_rest = matches!(entries.last(), Some(DictionaryPatternEntry::Rest));
                let fixed = entries.len() - usize::from(has_rest);
                let result = self.test_container(value, type_addr, VariantType::Dictionary, fixed, has_rest);

                for entry in &entries[..fixed] {
                    let DictionaryPatternEntry::Pair { key, value: pattern } = entry else {
                        return Err(CompileError::internal(
                            "`..` before the end of a dictionary pattern",
                            self.pos(),
                        ));
                    };
                    self.emitter.write_and_left_operand(&result);
                    let key = self.lower_expr(key)?;
                    self.emitter.write_call(Some(&result), value, "has", &[key.clone()]);
                    if let Some(pattern) = pattern {
                        self.emitter.write_and_left_operand(&result);
                        self.lower_element(pattern, value, &key, &result)?;
                        self.emitter.write_and_right_operand(&result);
                        self.emitter.write_end_and(&result);
                    }
                    self.emitter.write_and_right_operand(&result);
                    self.emitter.write_end_and(&result);
                    self.release(&key);
                }

                self.close_pattern(&result, previous, is_first, is_nested);
                self.release(&result);
            }
            Pattern::Rest => {
                return Err(CompileError::internal(
                    "`..` outside the end of an array or dictionary pattern",
                    self.pos(),
                ))
            }
        }
        Ok(())
    }

    fn open_pattern(&mut self, previous: &Address, is_first: bool, is_nested: bool) {
        if is_nested {
            self.emitter.write_and_left_operand(previous);
        } else if !is_first {
            self.emitter.write_or_left_operand(previous);
        }
    }

    fn close_pattern(&mut self, result: &Address, previous: &Address, is_first: bool, is_nested: bool) {
        if is_nested {
            self.emitter.write_and_right_operand(result);
            self.emitter.write_end_and(previous);
        } else if !is_first {
            self.emitter.write_or_right_operand(result);
            self.emitter.write_end_or(previous);
        } else {
            self.emitter.write_assign(previous, result);
        }
    }

    fn match_anything(&mut self, previous: &Address, is_first: bool, is_nested: bool) {
        if is_nested || !is_first {
            self.close_pattern(&Address::constant(Constant::Bool(true)), previous, is_first, is_nested);
        } else {
            self.emitter.write_assign_true(previous);
        }
    }

    /// Same runtime kind and equal value
    #[allow(clippy::too_many_arguments)]
    fn compare_value(
        &mut self,
        value: &Address,
        type_addr: &Address,
        expected: &Address,
        tag: &Address,
        kind: VariantType,
        previous: &Address,
        is_first: bool,
        is_nested: bool,
    ) {
        let type_equal = self.add_temporary(&DataType::bool());
        self.emitter.write_binary_operator(&type_equal, BinaryOp::Equal, type_addr, tag);
        if kind.is_string_like() {
            let other = if kind == VariantType::String {
                VariantType::StringName
            } else {
                VariantType::String
            };
            let alternative = self.add_temporary(&DataType::bool());
            let other_tag = Address::constant(Constant::Int(other.tag()));
            self.emitter
                .write_binary_operator(&alternative, BinaryOp::Equal, type_addr, &other_tag);
            self.emitter.write_or_left_operand(&type_equal);
            self.emitter.write_or_right_operand(&alternative);
            self.emitter.write_end_or(&type_equal);
            self.release(&alternative);
        }

        self.emitter.write_and_left_operand(&type_equal);
        let value_equal = self.add_temporary(&DataType::bool());
        self.emitter
            .write_binary_operator(&value_equal, BinaryOp::Equal, value, expected);
        self.emitter.write_and_right_operand(&value_equal);
        self.emitter.write_end_and(&type_equal);
        self.release(&value_equal);

        self.close_pattern(&type_equal, previous, is_first, is_nested);
        self.release(&type_equal);
    }

    /// Kind and length checks of an array or dictionary pattern; returns the live result temporary
    fn test_container(
        &mut self,
        value: &Address,
        type_addr: &Address,
        kind: VariantType,
        fixed: usize,
        has_rest: bool,
    ) -> Address {
        let result = self.add_temporary(&DataType::bool());
        let tag = Address::constant(Constant::Int(kind.tag()));
        self.emitter.write_binary_operator(&result, BinaryOp::Equal, type_addr, &tag);
        self.emitter.write_and_left_operand(&result);

        let length = self.add_temporary(&DataType::int());
        self.emitter
            .write_call_script_utility(Some(&length), "len", &[value.clone()]);
        let expected = Address::constant(Constant::Int(fixed as i64));
        let op = if has_rest {
            BinaryOp::GreaterEqual
        } else {
            BinaryOp::Equal
        };
        self.emitter.write_binary_operator(&result, op, &length, &expected);
        self.emitter.write_and_right_operand(&result);
        self.emitter.write_end_and(&result);
        self.release(&length);
        result
    }

    /// Read `container[key]` and match it as a nested pattern into `result`
    fn lower_element(
        &mut self,
        pattern: &Pattern,
        container: &Address,
        key: &Address,
        result: &Address,
    ) -> CompileResult<()> {
        let element = self.add_temporary(&DataType::Variant);
        self.emitter.write_get(&element, key, container);
        let element_type = self.add_temporary(&DataType::int());
        self.emitter.write_typeof(&element_type, &element);
        self.lower_pattern(pattern, &element, &element_type, result, false, true)?;
        self.release(&element_type);
        self.release(&element);
        Ok(())
    }
}
