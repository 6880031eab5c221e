//! Group declarations
//!
//! `group Level : int { Low = 1, High = Low * 10 }`. A group is not a type:
//! its name is a descriptor and its members are compile-time constants of
//! the base type. Member initializers are evaluated by the constant folder
//! and may reference earlier members, bare or qualified, and earlier groups.

use super::error::{codes, Diagnostic, ErrorCode};
use super::suggest::suggest;
use crate::ast::{ExprKind, GroupDecl, Program};
use crate::compiler::const_eval::{evaluate, ConstEnv};
use crate::compiler::ir::IrConstant;
use crate::types::Type;
use rustc_hash::FxHashSet;
use tracing::debug;

/// A validated group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub name: String,
    pub base_type: Type,
    /// Members in declaration order with their folded values
    pub members: Vec<(String, IrConstant)>,
}

impl GroupInfo {
    pub fn member(&self, name: &str) -> Option<&IrConstant> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(n, _)| n.as_str())
    }
}

/// Every group of a program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTable {
    groups: Vec<GroupInfo>,
}

impl GroupTable {
    pub fn get(&self, name: &str) -> Option<&GroupInfo> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupInfo> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Validate every group of `program`
///
/// `env` holds the constants visible to initializers (module constants);
/// qualified `Group.Member` entries are added to it as groups are
/// validated, so later declarations see earlier ones.
pub fn check_groups(program: &Program, env: &mut ConstEnv) -> (GroupTable, Vec<Diagnostic>) {
    let mut table = GroupTable::default();
    let mut diagnostics = Vec::new();

    for decl in program.groups() {
        if table.contains(&decl.name) {
            diagnostics.push(Diagnostic::new(
                &program.file,
                decl.span,
                codes::DUPLICATE_DECLARATION,
                format!("group '{}' is declared more than once", decl.name),
            ));
            continue;
        }
        let group = check_group(&program.file, decl, env, &mut diagnostics);
        for (member, value) in &group.members {
            env.insert(format!("{}.{}", group.name, member), value.clone());
        }
        debug!(group = %group.name, members = group.members.len(), "group validated");
        table.groups.push(group);
    }

    (table, diagnostics)
}

fn check_group(
    file: &str,
    decl: &GroupDecl,
    shared: &ConstEnv,
    diagnostics: &mut Vec<Diagnostic>,
) -> GroupInfo {
    let base_ok = decl.base_type.is_scalar();
    if !base_ok {
        diagnostics.push(Diagnostic::new(
            file,
            decl.span,
            codes::GROUP_BASE_TYPE,
            format!(
                "group '{}' has base type '{}'; expected a non-void scalar type",
                decl.name, decl.base_type
            ),
        ));
    }

    // Bare member names are only visible inside this declaration
    let mut local = shared.clone();
    let mut seen = FxHashSet::default();
    let mut members: Vec<(String, IrConstant)> = Vec::new();

    for member in &decl.members {
        if !seen.insert(member.name.as_str()) {
            diagnostics.push(Diagnostic::new(
                file,
                member.span,
                codes::GROUP_DUPLICATE_MEMBER,
                format!("group '{}' already has a member '{}'", decl.name, member.name),
            ));
            continue;
        }

        let Some(value) = evaluate(&member.value, &local) else {
            let mut diag = Diagnostic::new(
                file,
                member.value.span,
                codes::GROUP_NOT_CONSTANT,
                format!(
                    "initializer of '{}.{}' is not a compile-time constant",
                    decl.name, member.name
                ),
            );
            if let ExprKind::Identifier(name) = &member.value.kind {
                let candidates = members.iter().map(|(n, _)| n.as_str());
                diag = diag.with_suggestions(suggest(name, candidates));
            }
            diagnostics.push(diag);
            continue;
        };

        let value = if base_ok {
            match coerce_member(&value, &decl.base_type) {
                Ok(value) => value,
                Err(diag_code) => {
                    let message = if diag_code == codes::BYTE_LITERAL_RANGE {
                        format!(
                            "value {} of '{}.{}' does not fit in a byte (0..255)",
                            value, decl.name, member.name
                        )
                    } else {
                        format!(
                            "member '{}.{}' has type '{}' but the group's base type is '{}'",
                            decl.name,
                            member.name,
                            value.ty(),
                            decl.base_type
                        )
                    };
                    diagnostics.push(Diagnostic::new(file, member.value.span, diag_code, message));
                    continue;
                }
            }
        } else {
            value
        };

        local.insert(member.name.clone(), value.clone());
        local.insert(format!("{}.{}", decl.name, member.name), value.clone());
        members.push((member.name.clone(), value));
    }

    GroupInfo {
        name: decl.name.clone(),
        base_type: decl.base_type.clone(),
        members,
    }
}

/// Integer constants are accepted for a `byte` base after a range check
fn coerce_member(value: &IrConstant, base: &Type) -> Result<IrConstant, ErrorCode> {
    match value {
        IrConstant::Int(v) if *base == Type::byte() => u8::try_from(*v)
            .map(IrConstant::Byte)
            .map_err(|_| codes::BYTE_LITERAL_RANGE),
        v if v.ty() == *base => Ok(v.clone()),
        _ => Err(codes::GROUP_MEMBER_TYPE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expression};

    fn run(group: GroupDecl) -> (GroupTable, Vec<Diagnostic>) {
        let program = Program::new("groups.ps").with_group(group);
        check_groups(&program, &mut ConstEnv::default())
    }

    #[test]
    fn test_members_reference_earlier_members() {
        let (table, diags) = run(GroupDecl::new("Level", Type::int())
            .with_member("Low", Expression::int(1))
            .with_member(
                "High",
                Expression::binary(BinaryOp::Mul, Expression::ident("Low"), Expression::int(10)),
            )
            .with_member("Max", Expression::member(Expression::ident("Level"), "High")));
        assert!(diags.is_empty(), "{:?}", diags);
        let level = table.get("Level").unwrap();
        assert_eq!(level.member("High"), Some(&IrConstant::Int(10)));
        assert_eq!(level.member("Max"), Some(&IrConstant::Int(10)));
    }

    #[test]
    fn test_invalid_base_type() {
        let (_, diags) = run(GroupDecl::new("Bad", Type::list(Type::int())));
        assert!(diags[0].is(codes::GROUP_BASE_TYPE));
    }

    #[test]
    fn test_non_constant_member_suggests_earlier_member() {
        let (_, diags) = run(GroupDecl::new("Level", Type::int())
            .with_member("Low", Expression::int(1))
            .with_member("High", Expression::ident("Lw")));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is(codes::GROUP_NOT_CONSTANT));
        assert_eq!(diags[0].suggestions, vec!["Low".to_string()]);
    }

    #[test]
    fn test_duplicate_and_mistyped_members() {
        let (table, diags) = run(GroupDecl::new("Flag", Type::bool())
            .with_member("On", Expression::bool(true))
            .with_member("On", Expression::bool(false))
            .with_member("Off", Expression::int(0)));
        assert!(diags[0].is(codes::GROUP_DUPLICATE_MEMBER));
        assert!(diags[1].is(codes::GROUP_MEMBER_TYPE));
        assert_eq!(table.get("Flag").unwrap().members.len(), 1);
    }

    #[test]
    fn test_byte_base_accepts_int_in_range() {
        let (table, diags) = run(GroupDecl::new("Mask", Type::byte())
            .with_member("Lo", Expression::int(15))
            .with_member("Big", Expression::int(300)));
        assert_eq!(table.get("Mask").unwrap().member("Lo"), Some(&IrConstant::Byte(15)));
        assert!(diags[0].is(codes::BYTE_LITERAL_RANGE));
    }
}
