//! Recursive-descent parser for signature files.
//!
//! One grammar covers every dialect. Differences between versions are
//! tolerated rather than enforced: modifiers and annotations may appear in
//! any order, nullness may be written as annotations or as `?`/`!` suffixes,
//! and `implements` lists may be separated by spaces or commas.
//!
//! Default-value and annotation-argument expressions are never evaluated.
//! They are captured as balanced token spans and kept as raw source text.

use tracing::debug;

use crate::error::ParseError;
use crate::format::FileFormat;
use crate::model::annotation::qualify_annotation_name;
use crate::model::{
    Annotation, ArrayDim, BoundKind, Callable, ClassItem, ClassKind, Codebase, ConstantValue,
    FieldData, MemberItem, MemberKind, Modifier, ModelError, ModifierSet, Nullness, ParameterItem,
    TypeArg, TypeParameter, TypeRef, Visibility,
};
use crate::tokenizer::{tokenize, Token, TokenKind};

type PResult<T> = Result<T, ParseError>;

/// Kotlin modifiers that are also legal identifiers; they only count as
/// modifiers when another declaration token follows.
const SOFT_MODIFIERS: &[&str] = &[
    "sealed", "fun", "data", "value", "inline", "infix", "operator", "suspend",
];

/// File name used in errors for in-memory input.
pub const INPUT_NAME: &str = "<input>";

// ============================================================================
// Entry Points
// ============================================================================

/// Parse signature text into a codebase.
pub fn parse(text: &str, format: FileFormat) -> PResult<Codebase> {
    parse_named(INPUT_NAME, text, format)
}

/// Parse signature text, reporting errors against `file`.
///
/// `format` selects the dialect; [`FileFormat::Unknown`] is parsed with the
/// newest grammar. Non-signature formats are rejected.
pub fn parse_named(file: &str, text: &str, format: FileFormat) -> PResult<Codebase> {
    if !matches!(
        format,
        FileFormat::V1 | FileFormat::V2 | FileFormat::V3 | FileFormat::Unknown
    ) {
        return Err(ParseError::new(
            crate::types::Location::file_start(file),
            format!("{} is not a signature format", format),
        ));
    }
    let tokens = tokenize(file, text)?;
    let mut parser = Parser {
        file,
        source: text,
        tokens,
        pos: 0,
    };
    let mut codebase = Codebase::new();
    while !parser.at_end() {
        parser.parse_package(&mut codebase)?;
    }
    codebase.canonicalize();
    debug!(
        file,
        format = %format,
        packages = codebase.packages().count(),
        classes = codebase.class_count(),
        members = codebase.member_count(),
        "parsed signature file"
    );
    Ok(codebase)
}

/// Parse a single type in signature syntax (any dialect).
pub fn parse_type(text: &str) -> PResult<TypeRef> {
    let tokens = tokenize(INPUT_NAME, text)?;
    let mut parser = Parser {
        file: INPUT_NAME,
        source: text,
        tokens,
        pos: 0,
    };
    let mut ty = parser.parse_type()?;
    if !parser.at_end() {
        return Err(parser.error_here("unexpected text after type"));
    }
    ty.qualify_java_lang(&|_| false);
    Ok(ty)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    file: &'a str,
    source: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

/// Declaration prefix shared by classes and members.
#[derive(Default)]
struct Prefix {
    modifiers: ModifierSet,
    annotations: Vec<Annotation>,
    nullness: Nullness,
    /// A second nullness annotation, which binds to the base of the type.
    base_nullness: Option<Nullness>,
    deprecated: bool,
    /// A visibility keyword was present.
    has_visibility: bool,
}

impl Prefix {
    fn apply_nullness(&self, ty: &mut TypeRef) {
        if let Some(base) = self.base_nullness {
            if !crate::model::types::is_primitive(&ty.name) {
                ty.nullness = base;
            }
        }
        if self.nullness.is_known() {
            ty.set_value_nullness(self.nullness);
        }
    }
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn peek_ident(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(word))
    }

    fn peek_annotation(&self) -> bool {
        self.peek_punct("@") && !self.peek_at(1).is_some_and(|t| t.is_ident("interface"))
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::at_offset(self.file, self.source, offset, message)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let offset = self.peek().map(|t| t.start).unwrap_or(self.source.len());
        self.error_at(offset, message)
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(tok) => format!("'{}'", tok.text),
            None => "end of file".to_string(),
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Token<'a>> {
        if self.peek_punct(p) {
            if let Some(tok) = self.advance() {
                return Ok(tok);
            }
        }
        Err(self.error_here(format!("expected '{}', found {}", p, self.describe_next())))
    }

    fn expect_ident(&mut self) -> PResult<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                let tok = *tok;
                self.pos += 1;
                Ok(tok)
            }
            _ => Err(self.error_here(format!(
                "expected identifier, found {}",
                self.describe_next()
            ))),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> PResult<Token<'a>> {
        if self.peek_ident(word) {
            if let Some(tok) = self.advance() {
                return Ok(tok);
            }
        }
        Err(self.error_here(format!("expected '{}', found {}", word, self.describe_next())))
    }

    /// `a.b.c` (no annotations).
    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_ident()?.text.to_string();
        while self.peek_punct(".")
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::Ident)
        {
            self.pos += 1;
            name.push('.');
            name.push_str(self.expect_ident()?.text);
        }
        Ok(name)
    }

    fn model_error(&self, offset: usize, err: ModelError) -> ParseError {
        self.error_at(offset, err.to_string())
    }

    // ------------------------------------------------------------------
    // Packages and classes
    // ------------------------------------------------------------------

    fn parse_package(&mut self, codebase: &mut Codebase) -> PResult<()> {
        let mut annotations = Vec::new();
        while self.peek_annotation() {
            annotations.push(self.parse_annotation()?);
        }
        self.expect_keyword("package")?;
        while self.peek_annotation() {
            annotations.push(self.parse_annotation()?);
        }
        let name = self.parse_dotted_name()?;
        self.expect_punct("{")?;

        codebase.ensure_package(&name).annotations.extend(annotations);
        while !self.peek_punct("}") {
            if self.at_end() {
                return Err(self.error_here(format!("unterminated package {}", name)));
            }
            let start = self.peek().map(|t| t.start).unwrap_or(0);
            let class = self.parse_class(&name)?;
            codebase
                .add_class(class)
                .map_err(|e| self.model_error(start, e))?;
        }
        self.expect_punct("}")?;
        Ok(())
    }

    fn parse_prefix(&mut self) -> PResult<Prefix> {
        let mut prefix = Prefix::default();
        let mut seen_keyword = false;
        loop {
            if self.peek_annotation() {
                // annotations after the last keyword belong to the type
                if seen_keyword && !self.keyword_follows(self.pos) {
                    break;
                }
                let ann = self.parse_annotation()?;
                if ann.is_deprecated() {
                    prefix.deprecated = true;
                } else if let Some(nullness) = ann.nullness() {
                    if prefix.nullness.is_known() {
                        prefix.base_nullness = Some(nullness);
                    } else {
                        prefix.nullness = nullness;
                    }
                } else {
                    prefix.annotations.push(ann);
                }
                continue;
            }
            let Some(tok) = self.peek().copied() else {
                break;
            };
            if tok.kind != TokenKind::Ident {
                break;
            }
            if tok.text == "deprecated" {
                prefix.deprecated = true;
            } else if let Some(vis) = Visibility::from_keyword(tok.text) {
                prefix.modifiers.visibility = vis;
                prefix.has_visibility = true;
            } else if let Some(modifier) = Modifier::from_keyword(tok.text) {
                if SOFT_MODIFIERS.contains(&tok.text) && !self.soft_modifier_applies() {
                    break;
                }
                prefix.modifiers.insert(modifier);
            } else {
                break;
            }
            seen_keyword = true;
            self.pos += 1;
        }
        Ok(prefix)
    }

    /// Whether a modifier keyword follows the annotations starting at `idx`.
    fn keyword_follows(&self, mut idx: usize) -> bool {
        loop {
            let Some(tok) = self.tokens.get(idx) else {
                return false;
            };
            if tok.is_punct("@") {
                idx = self.annotation_end(idx);
                continue;
            }
            return tok.kind == TokenKind::Ident
                && (tok.text == "deprecated"
                    || Visibility::from_keyword(tok.text).is_some()
                    || Modifier::from_keyword(tok.text).is_some());
        }
    }

    /// Index just past the annotation starting at `idx` (`@a.b.C(...)`).
    fn annotation_end(&self, idx: usize) -> usize {
        let mut i = idx + 1;
        while let Some(tok) = self.tokens.get(i) {
            if tok.kind == TokenKind::Ident || tok.is_punct(".") {
                i += 1;
            } else {
                break;
            }
        }
        if self.tokens.get(i).is_some_and(|t| t.is_punct("(")) {
            let mut depth = 0usize;
            while let Some(tok) = self.tokens.get(i) {
                i += 1;
                if tok.is_punct("(") {
                    depth += 1;
                } else if tok.is_punct(")") {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
            }
        }
        i
    }

    fn soft_modifier_applies(&self) -> bool {
        self.peek_at(1).is_some_and(|next| {
            next.kind == TokenKind::Ident || next.is_punct("@") || next.is_punct("<")
        })
    }

    fn parse_class(&mut self, package: &str) -> PResult<ClassItem> {
        let prefix = self.parse_prefix()?;

        let kind = if self.peek_punct("@") {
            self.pos += 1;
            self.expect_keyword("interface")?;
            ClassKind::AnnotationType
        } else {
            let tok = self.expect_ident()?;
            ClassKind::from_keyword(tok.text).ok_or_else(|| {
                self.error_at(
                    tok.start,
                    format!("expected class, interface, enum or @interface, found '{}'", tok.text),
                )
            })?
        };

        let name = self.parse_dotted_name()?;
        let mut class = ClassItem::new(package, &name, kind);
        class.modifiers = prefix.modifiers;
        if !prefix.has_visibility {
            class.modifiers.visibility = Visibility::PackagePrivate;
        }
        class.annotations = prefix.annotations;
        class.deprecated = prefix.deprecated;
        if self.peek_punct("<") {
            class.type_params = self.parse_type_params()?;
        }

        loop {
            if self.peek_ident("extends") {
                self.pos += 1;
                for ty in self.parse_supertype_list()? {
                    self.add_extends(&mut class, ty);
                }
            } else if self.peek_ident("implements") {
                self.pos += 1;
                for ty in self.parse_supertype_list()? {
                    add_interface(&mut class, ty);
                }
            } else {
                break;
            }
        }

        self.expect_punct("{")?;
        let type_vars: Vec<String> = class.type_params.iter().map(|p| p.name.clone()).collect();
        let is_var = |n: &str| type_vars.iter().any(|v| v == n);
        for param in &mut class.type_params {
            for bound in &mut param.bounds {
                bound.qualify_java_lang(&is_var);
            }
        }
        if let Some(superclass) = &mut class.superclass {
            superclass.qualify_java_lang(&is_var);
        }
        for iface in &mut class.interfaces {
            iface.qualify_java_lang(&is_var);
        }

        while !self.peek_punct("}") {
            if self.at_end() {
                return Err(self.error_here(format!("unterminated class {}", name)));
            }
            let start = self.peek().map(|t| t.start).unwrap_or(0);
            let mut member = self.parse_member(&class)?;
            qualify_member(&mut member, &type_vars);
            class
                .add_member(member)
                .map_err(|e| self.model_error(start, e))?;
        }
        self.expect_punct("}")?;
        Ok(class)
    }

    /// A repeated `extends` naming the same type is dropped; a different type
    /// on a class becomes an interface.
    fn add_extends(&self, class: &mut ClassItem, ty: TypeRef) {
        if class.kind.is_interface_like() {
            add_interface(class, ty);
            return;
        }
        match &class.superclass {
            None => class.superclass = Some(ty),
            Some(existing) if existing.name == ty.name => {}
            Some(_) => add_interface(class, ty),
        }
    }

    fn parse_supertype_list(&mut self) -> PResult<Vec<TypeRef>> {
        let mut types = vec![self.parse_type()?];
        loop {
            if self.peek_punct(",") {
                self.pos += 1;
                types.push(self.parse_type()?);
            } else if self.peek_punct("{")
                || self.peek_ident("extends")
                || self.peek_ident("implements")
            {
                break;
            } else if self
                .peek()
                .is_some_and(|t| t.kind == TokenKind::Ident || t.is_punct("@"))
            {
                types.push(self.parse_type()?);
            } else {
                return Err(self.error_here(format!(
                    "expected supertype or '{{', found {}",
                    self.describe_next()
                )));
            }
        }
        Ok(types)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    fn parse_member(&mut self, class: &ClassItem) -> PResult<MemberItem> {
        let kw = self.expect_ident()?;
        let prefix;
        let mut member = match kw.text {
            "ctor" => {
                prefix = self.parse_prefix()?;
                let type_params = if self.peek_punct("<") {
                    self.parse_type_params()?
                } else {
                    Vec::new()
                };
                let name = self.parse_dotted_name()?;
                let parameters = self.parse_parameters()?;
                let throws = self.parse_throws()?;
                MemberItem::new(
                    name,
                    MemberKind::Constructor(Callable {
                        type_params,
                        return_type: None,
                        parameters,
                        throws,
                        annotation_default: None,
                    }),
                )
            }
            "method" => {
                prefix = self.parse_prefix()?;
                let type_params = if self.peek_punct("<") {
                    self.parse_type_params()?
                } else {
                    Vec::new()
                };
                let mut return_type = self.parse_type()?;
                prefix.apply_nullness(&mut return_type);
                let name = self.expect_ident()?.text.to_string();
                let parameters = self.parse_parameters()?;
                let throws = self.parse_throws()?;
                let annotation_default = if self.peek_ident("default") {
                    self.pos += 1;
                    Some(self.parse_expression(&[";"])?)
                } else {
                    None
                };
                MemberItem::new(
                    name,
                    MemberKind::Method(Callable {
                        type_params,
                        return_type: Some(return_type),
                        parameters,
                        throws,
                        annotation_default,
                    }),
                )
            }
            "field" | "enum_constant" => {
                prefix = self.parse_prefix()?;
                let mut ty = self.parse_type()?;
                prefix.apply_nullness(&mut ty);
                let name = self.expect_ident()?.text.to_string();
                let value = if self.peek_punct("=") {
                    let eq = self.advance().map(|t| t.end).unwrap_or(0);
                    let literal = self.parse_expression(&[";"])?;
                    let mut qualified = ty.clone();
                    qualified.qualify_java_lang(&|_| false);
                    let type_name = qualified.erased(&[]);
                    Some(ConstantValue::parse(&literal, &type_name).ok_or_else(|| {
                        self.error_at(
                            eq,
                            format!("invalid {} constant value {}", type_name, literal.trim()),
                        )
                    })?)
                } else {
                    None
                };
                let data = FieldData { ty, value };
                let kind = if kw.text == "field" {
                    MemberKind::Field(data)
                } else {
                    MemberKind::EnumConstant(data)
                };
                MemberItem::new(name, kind)
            }
            other => {
                return Err(self.error_at(
                    kw.start,
                    format!(
                        "expected ctor, method, field or enum_constant in {}, found '{}'",
                        class.name, other
                    ),
                ))
            }
        };
        self.expect_punct(";")?;

        member.modifiers = prefix.modifiers;
        if !prefix.has_visibility {
            member.modifiers.visibility = Visibility::PackagePrivate;
        }
        member.annotations = prefix.annotations;
        member.deprecated = prefix.deprecated;
        Ok(member)
    }

    fn parse_parameters(&mut self) -> PResult<Vec<ParameterItem>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if self.peek_punct(")") {
            self.pos += 1;
            return Ok(params);
        }
        loop {
            params.push(self.parse_parameter()?);
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect_punct(")")?;
            break;
        }
        Ok(params)
    }

    fn parse_parameter(&mut self) -> PResult<ParameterItem> {
        let mut annotations = Vec::new();
        let mut declared = Prefix::default();
        loop {
            if self.peek_ident("vararg") || self.peek_ident("final") {
                self.pos += 1;
            } else if self.peek_annotation() {
                let ann = self.parse_annotation()?;
                match ann.nullness() {
                    Some(n) if declared.nullness.is_known() => declared.base_nullness = Some(n),
                    Some(n) => declared.nullness = n,
                    None => annotations.push(ann),
                }
            } else {
                break;
            }
        }
        let mut ty = self.parse_type()?;
        declared.apply_nullness(&mut ty);
        let name = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                let name = tok.text.to_string();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        };
        let default_value = if self.peek_punct("=") {
            self.pos += 1;
            Some(self.parse_expression(&[",", ")"])?)
        } else {
            None
        };
        Ok(ParameterItem {
            name,
            ty,
            annotations,
            default_value,
        })
    }

    fn parse_throws(&mut self) -> PResult<Vec<TypeRef>> {
        let mut throws = Vec::new();
        if !self.peek_ident("throws") {
            return Ok(throws);
        }
        self.pos += 1;
        throws.push(self.parse_type()?);
        while self.peek_punct(",") {
            self.pos += 1;
            throws.push(self.parse_type()?);
        }
        Ok(throws)
    }

    // ------------------------------------------------------------------
    // Annotations and expressions
    // ------------------------------------------------------------------

    fn parse_annotation(&mut self) -> PResult<Annotation> {
        self.expect_punct("@")?;
        let raw_name = self.parse_dotted_name()?;
        let mut annotation = Annotation::new(&qualify_annotation_name(&raw_name));
        if !self.peek_punct("(") {
            return Ok(annotation);
        }
        self.pos += 1;
        if self.peek_punct(")") {
            self.pos += 1;
            return Ok(annotation);
        }
        loop {
            let named = self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
                && self.peek_at(1).is_some_and(|t| t.is_punct("="));
            let attr_name = if named {
                let name = self.expect_ident()?.text.to_string();
                self.pos += 1;
                name
            } else {
                "value".to_string()
            };
            let value = self.parse_expression(&[",", ")"])?;
            annotation.set_attribute(attr_name, value.trim());
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect_punct(")")?;
            break;
        }
        Ok(annotation)
    }

    /// Consume a balanced token span up to (not including) a top-level stop
    /// token, returning its source text.
    fn parse_expression(&mut self, stops: &[&str]) -> PResult<String> {
        let start_pos = self.pos;
        let mut closers: Vec<&'static str> = Vec::new();
        loop {
            let Some(tok) = self.peek().copied() else {
                return Err(self.error_here("unterminated expression"));
            };
            if closers.is_empty()
                && tok.kind == TokenKind::Punct
                && stops.contains(&tok.text)
            {
                break;
            }
            if tok.kind == TokenKind::Punct {
                match tok.text {
                    "(" => closers.push(")"),
                    "[" => closers.push("]"),
                    "{" => closers.push("}"),
                    "<" if self.looks_like_type_args(self.pos) => closers.push(">"),
                    ")" | "]" | "}" | ">" => {
                        if closers.last() == Some(&tok.text) {
                            closers.pop();
                        } else if tok.text != ">" {
                            return Err(self.error_at(
                                tok.start,
                                format!("unbalanced '{}' in expression", tok.text),
                            ));
                        }
                    }
                    ";" if !closers.is_empty() && !closers.contains(&"}") => {
                        return Err(self.error_at(tok.start, "unterminated expression"));
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        if self.pos == start_pos {
            return Err(self.error_here("expected expression"));
        }
        let start = self.tokens[start_pos].start;
        let end = self.tokens[self.pos - 1].end;
        Ok(self.source[start..end].to_string())
    }

    /// Whether the `<` at token `idx` opens explicit type arguments
    /// (`List<String>`, `Collections.<T>emptyList()`) rather than a comparison.
    fn looks_like_type_args(&self, idx: usize) -> bool {
        let Some(open) = self.tokens.get(idx) else {
            return false;
        };
        let adjacent = idx > 0 && {
            let prev = &self.tokens[idx - 1];
            prev.end == open.start && (prev.kind == TokenKind::Ident || prev.is_punct("."))
        };
        if !adjacent {
            return false;
        }
        let mut depth = 0usize;
        for tok in &self.tokens[idx..] {
            match (tok.kind, tok.text) {
                (TokenKind::Punct, "<") => depth += 1,
                (TokenKind::Punct, ">") => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                (TokenKind::Ident, _) => {}
                (TokenKind::Punct, "." | "," | "?" | "[" | "]" | "&" | "@" | "...") => {}
                _ => return false,
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParameter>> {
        self.expect_punct("<")?;
        let mut params = Vec::new();
        loop {
            let name = self.expect_ident()?.text.to_string();
            let mut param = TypeParameter::new(name);
            if self.peek_ident("extends") {
                self.pos += 1;
                param.bounds.push(self.parse_type()?);
                while self.peek_punct("&") {
                    self.pos += 1;
                    param.bounds.push(self.parse_type()?);
                }
            }
            params.push(param);
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect_punct(">")?;
            break;
        }
        Ok(params)
    }

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let mut ty = TypeRef::default();
        while self.peek_annotation() {
            let ann = self.parse_annotation()?;
            absorb(ann, &mut ty.nullness, &mut ty.annotations);
        }
        ty.name = self.expect_ident()?.text.to_string();
        while self.peek_punct(".")
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::Ident || t.is_punct("@"))
        {
            self.pos += 1;
            while self.peek_annotation() {
                let ann = self.parse_annotation()?;
                absorb(ann, &mut ty.nullness, &mut ty.annotations);
            }
            ty.name.push('.');
            ty.name.push_str(self.expect_ident()?.text);
        }
        if self.peek_punct("<") {
            ty.args = self.parse_type_args()?;
        }
        if let Some(n) = self.parse_suffix() {
            ty.nullness = n;
        }
        loop {
            let save = self.pos;
            let mut dim = ArrayDim::default();
            while self.peek_annotation() {
                let ann = self.parse_annotation()?;
                absorb(ann, &mut dim.nullness, &mut dim.annotations);
            }
            if self.peek_punct("[") {
                self.pos += 1;
                self.expect_punct("]")?;
            } else if self.peek_punct("...") {
                self.pos += 1;
                ty.varargs = true;
            } else {
                self.pos = save;
                break;
            }
            if let Some(n) = self.parse_suffix() {
                dim.nullness = n;
            }
            ty.dims.push(dim);
            if ty.varargs {
                break;
            }
        }
        Ok(ty)
    }

    fn parse_suffix(&mut self) -> Option<Nullness> {
        let tok = self.peek()?;
        if tok.kind != TokenKind::Punct {
            return None;
        }
        let nullness = Nullness::from_suffix(tok.text.chars().next()?)?;
        if tok.text.len() != 1 {
            return None;
        }
        self.pos += 1;
        Some(nullness)
    }

    fn parse_type_args(&mut self) -> PResult<Vec<TypeArg>> {
        self.expect_punct("<")?;
        let mut args = Vec::new();
        loop {
            let save = self.pos;
            let mut annotations = Vec::new();
            while self.peek_annotation() {
                annotations.push(self.parse_annotation()?);
            }
            if self.peek_punct("?") {
                self.pos += 1;
                let bound = if self.peek_ident("extends") {
                    self.pos += 1;
                    Some((BoundKind::Extends, Box::new(self.parse_type()?)))
                } else if self.peek_ident("super") {
                    self.pos += 1;
                    Some((BoundKind::Super, Box::new(self.parse_type()?)))
                } else {
                    None
                };
                args.push(TypeArg::Wildcard { annotations, bound });
            } else {
                self.pos = save;
                args.push(TypeArg::Type(self.parse_type()?));
            }
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect_punct(">")?;
            break;
        }
        Ok(args)
    }
}

fn absorb(ann: Annotation, nullness: &mut Nullness, annotations: &mut Vec<Annotation>) {
    match ann.nullness() {
        Some(n) => *nullness = n,
        None => annotations.push(ann),
    }
}

fn add_interface(class: &mut ClassItem, ty: TypeRef) {
    if !class.interfaces.iter().any(|t| t.name == ty.name) {
        class.interfaces.push(ty);
    }
}

fn qualify_member(member: &mut MemberItem, class_type_vars: &[String]) {
    let method_vars: Vec<String> = member
        .callable()
        .map(|c| c.type_params.iter().map(|p| p.name.clone()).collect())
        .unwrap_or_default();
    let is_var = |n: &str| {
        class_type_vars.iter().any(|v| v == n) || method_vars.iter().any(|v| v == n)
    };
    match &mut member.kind {
        MemberKind::Constructor(c) | MemberKind::Method(c) => {
            for param in &mut c.type_params {
                for bound in &mut param.bounds {
                    bound.qualify_java_lang(&is_var);
                }
            }
            if let Some(ret) = &mut c.return_type {
                ret.qualify_java_lang(&is_var);
            }
            for param in &mut c.parameters {
                param.ty.qualify_java_lang(&is_var);
            }
            for thrown in &mut c.throws {
                thrown.qualify_java_lang(&is_var);
            }
        }
        MemberKind::Field(f) | MemberKind::EnumConstant(f) => f.ty.qualify_java_lang(&is_var),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberGroup, TypeStyle};

    fn parse_v2(body: &str) -> Codebase {
        parse(&format!("// Signature format: 2.0\n{}", body), FileFormat::V2).unwrap()
    }

    #[test]
    fn parses_legacy_single_line_input() {
        let codebase = parse(
            "package test.pkg { public class MyTest { ctor public MyTest(); method public int clamp(int); } }",
            FileFormat::V1,
        )
        .unwrap();
        let class = codebase.find_class("test.pkg.MyTest").unwrap();
        assert_eq!(class.kind, ClassKind::Class);
        assert_eq!(class.members.len(), 2);
        assert_eq!(class.members[0].group(), MemberGroup::Constructor);
        let clamp = &class.members[1];
        assert_eq!(clamp.name, "clamp");
        assert_eq!(clamp.value_type().unwrap().name, "int");
        assert_eq!(clamp.parameters()[0].name, None);
    }

    #[test]
    fn modifiers_in_any_order() {
        let codebase = parse(
            "package a {\n  abstract public static deprecated class B {\n    method final static public deprecated void m();\n  }\n}\n",
            FileFormat::V1,
        )
        .unwrap();
        let class = codebase.find_class("a.B").unwrap();
        assert!(class.deprecated);
        assert!(class.modifiers.is_static() && class.modifiers.is_abstract());
        assert_eq!(class.modifiers.visibility, Visibility::Public);
        let m = &class.members[0];
        assert!(m.deprecated && m.modifiers.is_final() && m.modifiers.is_static());
    }

    #[test]
    fn missing_visibility_is_package_private() {
        let codebase = parse_v2("package a {\n  class B {\n  }\n}\n");
        assert_eq!(
            codebase.find_class("a.B").unwrap().modifiers.visibility,
            Visibility::PackagePrivate
        );
    }

    #[test]
    fn chained_extends_are_collapsed() {
        let codebase = parse(
            "package a {\n  public class B extends a.Base extends a.Base extends a.Other implements a.I, a.J {\n  }\n}\n",
            FileFormat::V1,
        )
        .unwrap();
        let class = codebase.find_class("a.B").unwrap();
        assert_eq!(class.superclass.as_ref().unwrap().name, "a.Base");
        let ifaces: Vec<&str> = class.interfaces.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(ifaces, vec!["a.Other", "a.I", "a.J"]);
    }

    #[test]
    fn space_separated_implements() {
        let codebase = parse_v2("package a {\n  public class B implements a.I a.J {\n  }\n}\n");
        assert_eq!(codebase.find_class("a.B").unwrap().interfaces.len(), 2);
    }

    #[test]
    fn v3_suffixes_and_short_names() {
        let codebase = parse(
            "// Signature format: 3.0\npackage test.pkg {\n  public class MyTest {\n    method public Double? convert1(Float);\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let class = codebase.find_class("test.pkg.MyTest").unwrap();
        let method = &class.members[0];
        let ret = method.value_type().unwrap();
        assert_eq!(ret.name, "java.lang.Double");
        assert_eq!(ret.nullness, Nullness::Nullable);
        let param = &method.parameters()[0].ty;
        assert_eq!(param.name, "java.lang.Float");
        assert_eq!(param.nullness, Nullness::Platform);
    }

    #[test]
    fn declaration_nullness_applies_to_value() {
        let codebase = parse_v2(
            "package a {\n  public class B {\n    method @NonNull public String[] names(@Nullable String s);\n    field @Nullable public Double myNumber;\n  }\n}\n",
        );
        let class = codebase.find_class("a.B").unwrap();
        let names = class.members[0].value_type().unwrap();
        assert_eq!(names.dims[0].nullness, Nullness::NonNull);
        assert_eq!(names.nullness, Nullness::Platform);
        assert_eq!(
            class.members[0].parameters()[0].ty.nullness,
            Nullness::Nullable
        );
        assert_eq!(class.members[0].parameters()[0].name.as_deref(), Some("s"));
        assert_eq!(class.members[1].value_type().unwrap().nullness, Nullness::Nullable);
    }

    #[test]
    fn type_use_annotations_bind_to_position() {
        let ty = parse_type("java.lang.annotation.@NonNull Annotation @Nullable [] []").unwrap();
        assert_eq!(ty.name, "java.lang.annotation.Annotation");
        assert_eq!(ty.nullness, Nullness::NonNull);
        assert_eq!(ty.dims.len(), 2);
        assert_eq!(ty.dims[0].nullness, Nullness::Nullable);
        assert_eq!(ty.dims[1].nullness, Nullness::Platform);

        let generic = parse_type("java.util.Map<@NonNull String, ? extends java.util.List<Integer>?>").unwrap();
        assert_eq!(
            generic.render(&TypeStyle::PLAIN),
            "java.util.Map<java.lang.String, ? extends java.util.List<java.lang.Integer>>"
        );
        let anchors = generic.nullness_anchors();
        assert!(anchors.iter().any(|(_, n)| *n == Nullness::NonNull));
        assert!(anchors.iter().any(|(_, n)| *n == Nullness::Nullable));
    }

    #[test]
    fn varargs_and_defaults() {
        let codebase = parse(
            "// Signature format: 3.0\npackage a {\n  public class B {\n    method public void f(int x = 1 + (2, 3), String s = \"a, b)\", java.util.function.Function<String,Integer> g = { a, b -> a.len() }, Object... rest);\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let params = codebase.find_class("a.B").unwrap().members[0].parameters().to_vec();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].default_value.as_deref(), Some("1 + (2, 3)"));
        assert_eq!(params[1].default_value.as_deref(), Some("\"a, b)\""));
        assert_eq!(params[2].default_value.as_deref(), Some("{ a, b -> a.len() }"));
        assert!(params[3].is_varargs());
        assert_eq!(params[3].ty.name, "java.lang.Object");
    }

    #[test]
    fn comparison_in_default_is_not_generic() {
        let codebase = parse(
            "// Signature format: 3.0\npackage a {\n  public class B {\n    method public void f(boolean x = a < b, int y = 2);\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap();
        let params = codebase.find_class("a.B").unwrap().members[0].parameters().to_vec();
        assert_eq!(params[0].default_value.as_deref(), Some("a < b"));
        assert_eq!(params[1].default_value.as_deref(), Some("2"));
    }

    #[test]
    fn annotations_with_attributes() {
        let codebase = parse_v2(
            "package a {\n  @RestrictTo(androidx.annotation.RestrictTo.Scope.LIBRARY_GROUP) public class B {\n    method public void f(@IntRange(from=0, to=255) int x);\n  }\n}\n",
        );
        let class = codebase.find_class("a.B").unwrap();
        assert_eq!(class.annotations[0].name, "androidx.annotation.RestrictTo");
        assert_eq!(
            class.annotations[0].attribute("value"),
            Some("androidx.annotation.RestrictTo.Scope.LIBRARY_GROUP")
        );
        let range = &class.members[0].parameters()[0].annotations[0];
        assert_eq!(range.attribute("from"), Some("0"));
        assert_eq!(range.attribute("to"), Some("255"));
    }

    #[test]
    fn constants_ignore_trailing_comments() {
        let codebase = parse_v2(
            "package a {\n  public class B {\n    field public static final int X = 42; // 0xdeadbeef\n    field public static final char C = 65; // 0x0041 'A'\n    field public static final String S = \"x;y\";\n  }\n}\n",
        );
        let class = codebase.find_class("a.B").unwrap();
        let values: Vec<_> = class
            .members
            .iter()
            .map(|m| m.field_data().unwrap().value.clone().unwrap())
            .collect();
        assert_eq!(
            values,
            vec![
                ConstantValue::Int(42),
                ConstantValue::Char(65),
                ConstantValue::String("x;y".into())
            ]
        );
    }

    #[test]
    fn annotation_type_with_default() {
        let codebase = parse_v2(
            "package a {\n  public @interface Anno {\n    method public abstract int value() default 5;\n  }\n}\n",
        );
        let class = codebase.find_class("a.Anno").unwrap();
        assert_eq!(class.kind, ClassKind::AnnotationType);
        assert_eq!(
            class.members[0].callable().unwrap().annotation_default.as_deref(),
            Some("5")
        );
    }

    #[test]
    fn wildcards_keep_type_use_annotations() {
        let ty = parse_type("java.util.List<@test.pkg.Foo ? extends Number>").unwrap();
        match &ty.args[0] {
            TypeArg::Wildcard { annotations, bound } => {
                assert_eq!(annotations[0].name, "test.pkg.Foo");
                let (kind, bound) = bound.as_ref().unwrap();
                assert_eq!(*kind, BoundKind::Extends);
                assert_eq!(bound.name, "java.lang.Number");
            }
            other => panic!("expected wildcard, got {:?}", other),
        }
    }

    #[test]
    fn generic_methods_keep_type_variables() {
        let codebase = parse_v2(
            "package a {\n  public class B<String> {\n    method public <T extends Number> T pick(String, T) throws java.io.IOException, Exception;\n  }\n}\n",
        );
        let class = codebase.find_class("a.B").unwrap();
        let method = class.members[0].callable().unwrap();
        assert_eq!(method.return_type.as_ref().unwrap().name, "T");
        assert_eq!(method.type_params[0].bounds[0].name, "java.lang.Number");
        // class type variable shadows java.lang.String
        assert_eq!(method.parameters[0].ty.name, "String");
        let throws: Vec<&str> = method.throws.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(throws, vec!["java.io.IOException", "java.lang.Exception"]);
    }

    #[test]
    fn package_annotations_before_or_after_keyword() {
        let before = parse_v2("@RestrictTo(RestrictTo.Scope.LIBRARY) package a {\n}\n");
        let after = parse_v2("package @RestrictTo(RestrictTo.Scope.LIBRARY) a {\n}\n");
        assert_eq!(before, after);
        assert_eq!(before.package("a").unwrap().annotations.len(), 1);
    }

    #[test]
    fn duplicate_member_is_a_parse_error() {
        let result = parse(
            "package a {\n  public class B {\n    method public void m(int);\n    method public int m(int);\n  }\n}\n",
            FileFormat::V2,
        );
        let err = result.unwrap_err();
        assert_eq!(err.location.line, 4);
        assert!(err.message.contains("duplicate member"));
    }

    #[test]
    fn malformed_member_reports_location() {
        let err = parse(
            "package a {\n  public class B {\n    method public void m(int;\n  }\n}\n",
            FileFormat::V2,
        )
        .unwrap_err();
        assert_eq!(err.location.line, 3);
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn unknown_member_keyword_is_rejected() {
        let err = parse(
            "package a {\n  public class B {\n    property public int x;\n  }\n}\n",
            FileFormat::V3,
        )
        .unwrap_err();
        assert!(err.message.contains("found 'property'"));
    }

    #[test]
    fn non_signature_formats_are_rejected() {
        assert!(parse("", FileFormat::Jdiff).is_err());
        assert!(parse("", FileFormat::Unknown).unwrap().is_empty());
    }
}
