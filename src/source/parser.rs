//! Document parser seam and the default QML parser
//!
//! The index treats parsing as a pure function `text → SyntaxTree` behind the
//! [`DocumentParser`] trait. [`QmlParser`] is the bundled implementation: a
//! recursive-descent parser over QML's declarative structure that skips
//! JavaScript bodies and binding expressions by bracket balancing.

use super::lexer::{tokenize, Token, TokenKind};
use super::syntax::{ImportStatement, ImportTarget, Member, ObjectNode, Pragma, SyntaxTree};
use crate::symbol::{Position, TextRange};
use crate::{Error, Result};

/// Trait for document parsers
///
/// Implementations must be stateless between calls: the indexer calls `parse`
/// concurrently from several tasks and expects equal input to give equal output.
pub trait DocumentParser: Send + Sync {
    /// Get the language name (for logging)
    fn language_name(&self) -> &str;

    /// Parse a whole document
    fn parse(&self, text: &str) -> Result<SyntaxTree>;
}

/// Bundled parser for `.qml` documents
#[derive(Debug, Default, Clone, Copy)]
pub struct QmlParser;

impl QmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for QmlParser {
    fn language_name(&self) -> &str {
        "QML"
    }

    fn parse(&self, text: &str) -> Result<SyntaxTree> {
        let tokens = tokenize(text)?;
        Parser::new(tokens).parse_document()
    }
}

// ---------------------------------------------------------------------------
// Recursive-descent parser
// ---------------------------------------------------------------------------

/// Member keywords that are plain binding names when followed by `:`
const PROPERTY_MODIFIERS: &[&str] = &["default", "readonly", "required", "final", "virtual", "override"];

/// Deepest object nesting accepted; deeper documents fail instead of exhausting the stack
pub const MAX_NESTING_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    last_end: Position,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            last_end: Position::default(),
            depth: 0,
        }
    }

    fn parse_document(&mut self) -> Result<SyntaxTree> {
        let mut tree = SyntaxTree::default();

        loop {
            self.skip_separators();
            match self.peek_ident() {
                Some("pragma") => {
                    let pragma = self.parse_pragma()?;
                    tree.pragmas.push(pragma);
                }
                Some("import") => {
                    let import = self.parse_import()?;
                    tree.imports.push(import);
                }
                _ => break,
            }
        }

        if self.peek().is_none() {
            return Err(Error::Parse("expected a root object definition".to_string()));
        }
        tree.root = self.parse_object()?;

        self.skip_separators();
        if let Some(token) = self.peek() {
            return Err(self.error_at(token, "unexpected content after the root object"));
        }

        Ok(tree)
    }

    // ========== Header ==========

    fn parse_pragma(&mut self) -> Result<Pragma> {
        let start = self.expect_keyword("pragma")?;
        let (name, _) = self.expect_ident()?;

        let mut value = None;
        if self.at_punct(':') {
            self.next();
            let mut parts = Vec::new();
            while let Some(token) = self.peek() {
                match &token.kind {
                    TokenKind::Newline | TokenKind::Punct(';') => break,
                    TokenKind::Ident(part) => parts.push(part.clone()),
                    _ => {}
                }
                self.next();
            }
            value = Some(parts.join(", "));
        }

        Ok(Pragma {
            name,
            value,
            range: TextRange::new(start.start, self.last_end),
        })
    }

    fn parse_import(&mut self) -> Result<ImportStatement> {
        let start = self.expect_keyword("import")?;

        let target = match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Str(path)) => {
                self.next();
                ImportTarget::Path(path)
            }
            Some(TokenKind::Ident(_)) => {
                let (name, _) = self.qualified_name()?;
                ImportTarget::Module(name)
            }
            _ => return Err(self.error_here("expected a module name or quoted path after 'import'")),
        };

        let mut version = None;
        if let Some(TokenKind::Number(v)) = self.peek().map(|t| t.kind.clone()) {
            self.next();
            version = Some(v);
        }

        let mut alias = None;
        if self.peek_ident() == Some("as") {
            self.next();
            let (name, _) = self.expect_ident()?;
            alias = Some(name);
        }

        match self.peek() {
            None => {}
            Some(token) if matches!(token.kind, TokenKind::Newline | TokenKind::Punct(';')) => {}
            Some(token) => return Err(self.error_at(token, "unexpected token in import statement")),
        }

        Ok(ImportStatement {
            target,
            version,
            alias,
            range: TextRange::new(start.start, self.last_end),
        })
    }

    // ========== Objects ==========

    /// `Type [on target] { members }`
    fn parse_object(&mut self) -> Result<ObjectNode> {
        let (type_name, name_range) = self.qualified_name()?;
        if self.peek_ident() == Some("on") {
            self.next();
            self.qualified_name()?;
        }
        self.skip_newlines();
        self.parse_object_body(type_name, name_range.start)
    }

    fn parse_object_body(&mut self, type_name: String, start: Position) -> Result<ObjectNode> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here(&format!(
                "objects nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let object = self.parse_object_members(type_name, start);
        self.depth -= 1;
        object
    }

    fn parse_object_members(&mut self, type_name: String, start: Position) -> Result<ObjectNode> {
        self.expect_punct('{')?;
        let mut members = Vec::new();

        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err(Error::Parse(format!("missing '}}' for object '{}'", type_name))),
                Some(token) if token.is_punct('}') => {
                    self.next();
                    break;
                }
                Some(_) => members.push(self.parse_member()?),
            }
        }

        Ok(ObjectNode {
            type_name,
            range: TextRange::new(start, self.last_end),
            members,
        })
    }

    fn parse_member(&mut self) -> Result<Member> {
        let token = self.peek().cloned().ok_or_else(|| self.error_here("unexpected end of input"))?;
        let Some(word) = token.ident().map(str::to_string) else {
            return Err(self.error_at(&token, "expected a member declaration"));
        };
        let start = token.range.start;
        let is_binding_name = self.peek_nth(1).is_some_and(|t| t.is_punct(':'));

        if !is_binding_name {
            match word.as_str() {
                "property" => return self.parse_property(start),
                w if PROPERTY_MODIFIERS.contains(&w) => return self.parse_modified_member(start),
                "signal" => return self.parse_signal(start),
                "function" => return self.parse_function(start),
                "component" => return self.parse_inline_component(start),
                "enum" => return self.parse_enum(start),
                _ => {}
            }
        }

        if word == "id" && is_binding_name {
            self.next();
            self.next();
            let (name, _) = self.expect_ident()?;
            return Ok(Member::Id {
                name,
                range: TextRange::new(start, self.last_end),
            });
        }

        let (name, name_range) = self.qualified_name()?;
        if self.at_punct('{') || self.peek_ident() == Some("on") || (starts_uppercase(&name) && self.next_significant_is('{')) {
            if self.peek_ident() == Some("on") {
                self.next();
                self.qualified_name()?;
            }
            self.skip_newlines();
            let object = self.parse_object_body(name, name_range.start)?;
            return Ok(Member::Object(object));
        }

        if self.at_punct(':') {
            self.next();
            let objects = self.parse_binding_value()?;
            return Ok(Member::Binding {
                name,
                range: TextRange::new(start, self.last_end),
                objects,
            });
        }

        Err(self.error_here(&format!("expected ':' or '{{' after '{}'", name)))
    }

    /// `default property ...`, `readonly property ...`, `required property ...`,
    /// or a bare `required name` re-declaration.
    fn parse_modified_member(&mut self, start: Position) -> Result<Member> {
        while self.peek_ident().is_some_and(|w| PROPERTY_MODIFIERS.contains(&w)) {
            self.next();
        }
        if self.peek_ident() == Some("property") {
            return self.parse_property(start);
        }
        let (name, _) = self.expect_ident()?;
        Ok(Member::Binding {
            name,
            range: TextRange::new(start, self.last_end),
            objects: Vec::new(),
        })
    }

    fn parse_property(&mut self, start: Position) -> Result<Member> {
        self.expect_keyword("property")?;
        let type_name = self.parse_type_name()?;
        let (name, _) = self.expect_ident()?;

        let mut objects = Vec::new();
        if self.at_punct(':') {
            self.next();
            objects = self.parse_binding_value()?;
        }

        Ok(Member::Property {
            name,
            type_name,
            range: TextRange::new(start, self.last_end),
            objects,
        })
    }

    /// `int`, `Controls.Button`, `list<Item>`
    fn parse_type_name(&mut self) -> Result<String> {
        let (mut type_name, _) = self.qualified_name()?;
        if self.at_punct('<') {
            self.next();
            let (inner, _) = self.qualified_name()?;
            self.expect_punct('>')?;
            type_name = format!("{}<{}>", type_name, inner);
        }
        Ok(type_name)
    }

    fn parse_signal(&mut self, start: Position) -> Result<Member> {
        self.expect_keyword("signal")?;
        let (name, _) = self.expect_ident()?;
        if self.at_punct('(') {
            self.skip_balanced()?;
        }
        Ok(Member::Signal {
            name,
            range: TextRange::new(start, self.last_end),
        })
    }

    fn parse_function(&mut self, start: Position) -> Result<Member> {
        self.expect_keyword("function")?;
        let (name, _) = self.expect_ident()?;
        if !self.at_punct('(') {
            return Err(self.error_here("expected '(' after function name"));
        }
        self.skip_balanced()?;
        if self.at_punct(':') {
            self.next();
            self.parse_type_name()?;
        }
        self.skip_newlines();
        if !self.at_punct('{') {
            return Err(self.error_here("expected function body"));
        }
        self.skip_balanced()?;
        Ok(Member::Function {
            name,
            range: TextRange::new(start, self.last_end),
        })
    }

    fn parse_inline_component(&mut self, start: Position) -> Result<Member> {
        self.expect_keyword("component")?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct(':')?;
        self.skip_newlines();
        let object = self.parse_object()?;
        Ok(Member::InlineComponent {
            name,
            range: TextRange::new(start, self.last_end),
            object,
        })
    }

    fn parse_enum(&mut self, start: Position) -> Result<Member> {
        self.expect_keyword("enum")?;
        let (name, _) = self.expect_ident()?;
        self.skip_newlines();
        if !self.at_punct('{') {
            return Err(self.error_here("expected '{' after enum name"));
        }
        self.skip_balanced()?;
        Ok(Member::Enum {
            name,
            range: TextRange::new(start, self.last_end),
        })
    }

    // ========== Binding values ==========

    /// Consume a binding value and return any object definitions it contains.
    fn parse_binding_value(&mut self) -> Result<Vec<ObjectNode>> {
        self.skip_newlines();
        if self.at_punct('{') {
            self.skip_balanced()?;
            return Ok(Vec::new());
        }
        if self.at_punct('[') {
            return self.parse_array();
        }
        if self.looks_like_object() {
            return Ok(vec![self.parse_object()?]);
        }
        self.skip_expression(false)?;
        Ok(Vec::new())
    }

    fn parse_array(&mut self) -> Result<Vec<ObjectNode>> {
        self.expect_punct('[')?;
        let mut objects = Vec::new();
        loop {
            while self.peek().is_some_and(|t| t.kind == TokenKind::Newline || t.is_punct(',')) {
                self.next();
            }
            match self.peek() {
                None => return Err(Error::Parse("missing ']' in list binding".to_string())),
                Some(token) if token.is_punct(']') => {
                    self.next();
                    return Ok(objects);
                }
                Some(_) if self.looks_like_object() => objects.push(self.parse_object()?),
                Some(_) => self.skip_expression(true)?,
            }
        }
    }

    /// Skip a JavaScript expression up to the end of the binding.
    ///
    /// Stops before a newline, `;` or `}` at depth zero (and before `,`/`]` inside
    /// a list). A line break does not end the expression when the previous token is
    /// an operator or the next line starts with punctuation, since no member can
    /// start with punctuation.
    fn skip_expression(&mut self, in_list: bool) -> Result<()> {
        let mut closers: Vec<char> = Vec::new();
        let mut previous: Option<TokenKind> = None;

        while let Some(token) = self.peek().cloned() {
            if closers.is_empty() {
                match &token.kind {
                    TokenKind::Punct(';') | TokenKind::Punct('}') => return Ok(()),
                    TokenKind::Punct(',') | TokenKind::Punct(']') if in_list => return Ok(()),
                    TokenKind::Newline => {
                        let continues = previous.as_ref().is_some_and(is_operator)
                            || self.next_line_continues(in_list);
                        if !continues {
                            return Ok(());
                        }
                        self.next();
                        continue;
                    }
                    _ => {}
                }
            }

            match token.kind {
                TokenKind::Punct('(') => closers.push(')'),
                TokenKind::Punct('[') => closers.push(']'),
                TokenKind::Punct('{') => closers.push('}'),
                TokenKind::Punct(c @ (')' | ']' | '}')) => {
                    if closers.pop() != Some(c) {
                        return Err(self.error_at(&token, &format!("unbalanced '{}'", c)));
                    }
                }
                _ => {}
            }
            if token.kind != TokenKind::Newline {
                previous = Some(token.kind.clone());
            }
            self.next();
        }

        if closers.is_empty() {
            Ok(())
        } else {
            Err(Error::Parse("unexpected end of input inside expression".to_string()))
        }
    }

    fn next_line_continues(&self, in_list: bool) -> bool {
        let mut offset = 1;
        while let Some(token) = self.peek_nth(offset) {
            match &token.kind {
                TokenKind::Newline => offset += 1,
                TokenKind::Punct('}') => return false,
                TokenKind::Punct(',') | TokenKind::Punct(']') if in_list => return false,
                TokenKind::Punct(_) => return true,
                _ => return false,
            }
        }
        false
    }

    /// Skip a bracketed region starting at the current opening bracket
    fn skip_balanced(&mut self) -> Result<()> {
        let open = self.next().ok_or_else(|| self.error_here("expected an opening bracket"))?;
        let mut closers = match open.kind {
            TokenKind::Punct('(') => vec![')'],
            TokenKind::Punct('[') => vec![']'],
            TokenKind::Punct('{') => vec!['}'],
            _ => return Err(self.error_at(&open, "expected an opening bracket")),
        };

        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Punct('(') => closers.push(')'),
                TokenKind::Punct('[') => closers.push(']'),
                TokenKind::Punct('{') => closers.push('}'),
                TokenKind::Punct(c @ (')' | ']' | '}')) => {
                    if closers.pop() != Some(c) {
                        return Err(self.error_at(&token, &format!("unbalanced '{}'", c)));
                    }
                    if closers.is_empty() {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        Err(self.error_at(&open, "unclosed bracket"))
    }

    /// `Type {`, `Qualified.Type {`, or `Type on prop {` at the cursor
    fn looks_like_object(&self) -> bool {
        let mut offset = 0;
        let mut last_segment;
        loop {
            match self.peek_nth(offset).and_then(|t| t.ident()) {
                Some(segment) => last_segment = Some(segment),
                None => return false,
            }
            offset += 1;
            if self.peek_nth(offset).is_some_and(|t| t.is_punct('.')) {
                offset += 1;
                continue;
            }
            break;
        }
        if !last_segment.is_some_and(starts_uppercase) {
            return false;
        }
        while self.peek_nth(offset).is_some_and(|t| t.kind == TokenKind::Newline) {
            offset += 1;
        }
        match self.peek_nth(offset) {
            Some(token) => token.is_punct('{') || token.ident() == Some("on"),
            None => false,
        }
    }

    // ========== Token helpers ==========

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_nth(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    fn peek_ident(&self) -> Option<&str> {
        self.peek().and_then(Token::ident)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        self.last_end = token.range.end;
        Some(token)
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn next_significant_is(&self, c: char) -> bool {
        let mut offset = 0;
        while let Some(token) = self.peek_nth(offset) {
            if token.kind != TokenKind::Newline {
                return token.is_punct(c);
            }
            offset += 1;
        }
        false
    }

    fn skip_newlines(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::Newline) {
            self.next();
        }
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::Newline || t.is_punct(';')) {
            self.next();
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<TextRange> {
        match self.peek() {
            Some(token) if token.ident() == Some(keyword) => {
                let range = token.range;
                self.next();
                Ok(range)
            }
            _ => Err(self.error_here(&format!("expected '{}'", keyword))),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, TextRange)> {
        match self.peek() {
            Some(Token { kind: TokenKind::Ident(name), range }) => {
                let out = (name.clone(), *range);
                self.next();
                Ok(out)
            }
            _ => Err(self.error_here("expected an identifier")),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<Token> {
        match self.peek() {
            Some(token) if token.is_punct(c) => {
                let token = token.clone();
                self.next();
                Ok(token)
            }
            _ => Err(self.error_here(&format!("expected '{}'", c))),
        }
    }

    /// `a`, `a.b.c`
    fn qualified_name(&mut self) -> Result<(String, TextRange)> {
        let (mut name, mut range) = self.expect_ident()?;
        while self.at_punct('.') && self.peek_nth(1).is_some_and(|t| t.ident().is_some()) {
            self.next();
            let (segment, segment_range) = self.expect_ident()?;
            name.push('.');
            name.push_str(&segment);
            range = range.cover(segment_range);
        }
        Ok((name, range))
    }

    fn error_here(&self, message: &str) -> Error {
        match self.peek() {
            Some(token) => self.error_at(token, message),
            None => Error::Parse(format!("{} (at end of input)", message)),
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> Error {
        Error::Parse(format!(
            "{} at {}:{}",
            message,
            token.range.start.line + 1,
            token.range.start.character + 1
        ))
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .and_then(|segment| segment.chars().next())
        .is_some_and(char::is_uppercase)
}

fn is_operator(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Punct('+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '!' | '=' | '<' | '>' | '?' | ':' | ',' | '.')
    )
}
