//! Extracts function signatures and parameter struct layouts from shader source.
//!
//! Only declarations are understood. Function bodies, initializers and anything else that is
//! not a function or `struct`/`cbuffer` declaration is skipped, so the loader can be pointed
//! at full shader files as well as headers.

use crate::{
    error::{Result, ShaderGraphError},
    signature::{
        FunctionSignature, Parameter, ParameterDirection, ParameterStructSignature, StructMember,
    },
};
use logos::Logos;
use tracing::trace;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
#[logos(skip r"#[^\n]*")]
enum Token {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
    #[regex(r"[0-9][0-9A-Za-z_.]*", |lex| lex.slice().to_owned())]
    Number(String),
    #[regex(r#""[^"\n]*""#)]
    Str,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Equals,
    #[regex(r"[-+*/%&|^!~?.@$]")]
    Symbol,
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Ident(s) | Token::Number(s) => s,
            Token::Str => "\"\"",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Equals => "=",
            Token::Symbol => "?",
        }
    }

    fn is_word(&self) -> bool {
        matches!(self, Token::Ident(_) | Token::Number(_))
    }

    fn ident(&self) -> Option<&str> {
        match self {
            Token::Ident(s) => Some(s),
            _ => None,
        }
    }
}

/// Declaration modifiers that do not contribute to a type.
const MODIFIERS: &[&str] = &[
    "static",
    "inline",
    "const",
    "uniform",
    "extern",
    "precise",
    "shared",
    "groupshared",
    "volatile",
    "nointerpolation",
    "linear",
    "centroid",
    "noperspective",
    "sample",
];

/// Everything the loader found in one source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderSourceSignatures {
    pub functions: Vec<FunctionSignature>,
    pub structs: Vec<ParameterStructSignature>,
}

impl ShaderSourceSignatures {
    /// The first function declared with the given name. Later overloads are ignored.
    pub fn find_function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_struct(&self, name: &str) -> Option<&ParameterStructSignature> {
        self.structs.iter().find(|s| s.name == name)
    }
}

pub fn load_signatures(file_name: &str, source: &str) -> Result<ShaderSourceSignatures> {
    let tokens = tokenize(file_name, source)?;
    let mut parser = Parser {
        file_name,
        tokens,
        position: 0,
        output: ShaderSourceSignatures::default(),
    };
    parser.parse()?;

    trace!(
        file = file_name,
        functions = parser.output.functions.len(),
        structs = parser.output.structs.len(),
        "loaded signatures"
    );
    Ok(parser.output)
}

fn tokenize(file_name: &str, source: &str) -> Result<Vec<(Token, usize)>> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| match line_starts.binary_search(&offset) {
        Ok(line) => line + 1,
        Err(line) => line,
    };

    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let line = line_of(lexer.span().start);
        match token {
            Ok(token) => tokens.push((token, line)),
            Err(_) => {
                return Err(ShaderGraphError::Parse {
                    file: file_name.to_string(),
                    line,
                    message: format!("unexpected character `{}`", lexer.slice()),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    file_name: &'a str,
    tokens: Vec<(Token, usize)>,
    position: usize,
    output: ShaderSourceSignatures,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(token, _)| token.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, line)| *line)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ShaderGraphError::Parse {
            file: self.file_name.to_string(),
            line: self.line(),
            message: message.into(),
        })
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(ref token) if *token == expected => Ok(()),
            Some(token) => {
                self.position -= 1;
                self.error(format!(
                    "expected `{}`, found `{}`",
                    expected.text(),
                    token.text()
                ))
            }
            None => self.error(format!("expected `{}`, found end of file", expected.text())),
        }
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(token) = self.peek() {
            match token {
                Token::Ident(word) if word == "struct" || word == "cbuffer" => {
                    self.parse_struct()?
                }
                Token::LBracket => {
                    // Attribute, e.g. `[numthreads(8, 8, 1)]`.
                    self.skip_balanced(Token::LBracket, Token::RBracket)?;
                }
                Token::Semicolon => {
                    self.position += 1;
                }
                Token::RBrace => return self.error("unbalanced `}`"),
                _ => self.parse_declaration()?,
            }
        }
        Ok(())
    }

    /// Skips a bracketed region starting at the current opening token, including nested ones.
    fn skip_balanced(&mut self, open: Token, close: Token) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next() {
                Some(token) if token == open => depth += 1,
                Some(token) if token == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return self.error(format!("missing `{}`", close.text())),
            }
        }
    }

    /// Skips to the end of the current statement, stepping over any nested blocks.
    fn skip_statement(&mut self) -> Result<()> {
        while let Some(token) = self.peek() {
            match token {
                Token::Semicolon => {
                    self.position += 1;
                    return Ok(());
                }
                Token::LBrace => self.skip_balanced(Token::LBrace, Token::RBrace)?,
                Token::LParen => self.skip_balanced(Token::LParen, Token::RParen)?,
                Token::RBrace => return self.error("unbalanced `}`"),
                _ => self.position += 1,
            }
        }
        Ok(())
    }

    fn parse_declaration(&mut self) -> Result<()> {
        let start = self.position;
        let mut head: Vec<Token> = Vec::new();

        loop {
            match self.peek() {
                None => return self.error("unexpected end of file in declaration"),
                Some(Token::Semicolon) => {
                    self.position += 1;
                    return Ok(());
                }
                Some(Token::LBrace) => {
                    self.skip_balanced(Token::LBrace, Token::RBrace)?;
                    if let Some(Token::Semicolon) = self.peek() {
                        self.position += 1;
                    }
                    return Ok(());
                }
                Some(Token::Equals) | Some(Token::Colon) => {
                    self.skip_statement()?;
                    return Ok(());
                }
                Some(Token::LParen) => break,
                Some(token) => {
                    head.push(token.clone());
                    self.position += 1;
                }
            }
        }

        let name = match head.last().and_then(Token::ident) {
            Some(name) if head.len() >= 2 => name.to_string(),
            _ => {
                self.position = start;
                return self.skip_statement();
            }
        };
        let return_type = type_text(&head[..head.len() - 1]);
        if return_type.is_empty() {
            self.position = start;
            return self.skip_statement();
        }

        let parameters = self.parse_parameter_list(&name)?;
        let mut signature = FunctionSignature::new(&name).return_type(&return_type);
        signature.parameters = parameters;
        signature.source_file = self.file_name.to_string();

        // Optional return semantic, e.g. `float4 main() : SV_Target`.
        if let Some(Token::Colon) = self.peek() {
            self.position += 1;
            self.next();
        }

        match self.peek() {
            Some(Token::LBrace) => self.skip_balanced(Token::LBrace, Token::RBrace)?,
            Some(Token::Semicolon) => self.position += 1,
            _ => return self.error(format!("expected body or `;` after `{}`", name)),
        }

        trace!(file = self.file_name, function = %name, "found function");
        self.output.functions.push(signature);
        Ok(())
    }

    fn parse_parameter_list(&mut self, function: &str) -> Result<Vec<Parameter>> {
        self.expect(Token::LParen)?;

        let mut groups: Vec<Vec<Token>> = vec![Vec::new()];
        let mut depth = 0usize;
        loop {
            let token = match self.next() {
                Some(token) => token,
                None => return self.error(format!("unterminated parameter list in `{}`", function)),
            };
            match token {
                Token::RParen if depth == 0 => break,
                Token::Comma if depth == 0 => groups.push(Vec::new()),
                Token::LParen | Token::Less | Token::LBracket => {
                    depth += 1;
                    push_last(&mut groups, token);
                }
                Token::RParen | Token::Greater | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    push_last(&mut groups, token);
                }
                token => push_last(&mut groups, token),
            }
        }

        if groups.len() == 1
            && (groups[0].is_empty() || groups[0] == [Token::Ident("void".to_string())])
        {
            return Ok(Vec::new());
        }

        groups
            .into_iter()
            .map(|group| self.parameter_from_tokens(function, group))
            .collect()
    }

    fn parameter_from_tokens(&self, function: &str, tokens: Vec<Token>) -> Result<Parameter> {
        let mut direction = ParameterDirection::In;
        let mut declaration = Vec::new();
        let mut semantic = None;

        let mut tokens = tokens.into_iter().peekable();
        while let Some(token) = tokens.next() {
            match token {
                Token::Equals => break,
                Token::Colon => {
                    semantic = tokens.next().and_then(|t| t.ident().map(str::to_owned));
                    break;
                }
                Token::Ident(ref word) if word == "in" => direction = ParameterDirection::In,
                Token::Ident(ref word) if word == "out" => direction = ParameterDirection::Out,
                Token::Ident(ref word) if word == "inout" => {
                    direction = ParameterDirection::InOut
                }
                Token::Ident(ref word) if MODIFIERS.contains(&word.as_str()) => {}
                token => declaration.push(token),
            }
        }

        // Array suffix, e.g. `float weights[4]`.
        let mut suffix = String::new();
        if let Some(open) = declaration.iter().position(|t| *t == Token::LBracket) {
            suffix = type_text(&declaration[open..]);
            declaration.truncate(open);
        }

        match declaration.split_last() {
            Some((Token::Ident(name), type_tokens)) if !type_tokens.is_empty() => Ok(Parameter {
                name: name.clone(),
                type_name: type_text(type_tokens) + &suffix,
                direction,
                semantic,
            }),
            _ => self.error(format!("malformed parameter in `{}`", function)),
        }
    }

    fn parse_struct(&mut self) -> Result<()> {
        self.position += 1;
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return self.error("expected a name after `struct`"),
        };

        // `cbuffer Name : register(b0)`
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace | Token::Semicolon => break,
                Token::LParen => self.skip_balanced(Token::LParen, Token::RParen)?,
                _ => self.position += 1,
            }
        }
        if let Some(Token::Semicolon) = self.peek() {
            // Forward declaration.
            self.position += 1;
            return Ok(());
        }
        self.expect(Token::LBrace)?;

        let mut members = Vec::new();
        let mut statement: Vec<Token> = Vec::new();
        loop {
            match self.next() {
                None => return self.error(format!("unterminated struct `{}`", name)),
                Some(Token::RBrace) => break,
                Some(Token::Semicolon) => {
                    members.extend(self.members_from_tokens(&name, &statement)?);
                    statement.clear();
                }
                Some(Token::LBrace) => {
                    return self.error(format!("nested blocks are not supported in `{}`", name))
                }
                Some(token) => statement.push(token),
            }
        }
        if !statement.is_empty() {
            return self.error(format!("missing `;` in struct `{}`", name));
        }
        if let Some(Token::Semicolon) = self.peek() {
            self.position += 1;
        }

        trace!(file = self.file_name, structure = %name, "found struct");
        self.output.structs.push(ParameterStructSignature {
            name,
            members,
            source_file: self.file_name.to_string(),
        });
        Ok(())
    }

    fn members_from_tokens(&self, structure: &str, tokens: &[Token]) -> Result<Vec<StructMember>> {
        let tokens: Vec<Token> = tokens
            .iter()
            .filter(|t| !matches!(t.ident(), Some(word) if MODIFIERS.contains(&word)))
            .cloned()
            .collect();
        let mut declarators = tokens.split(|t| *t == Token::Comma);
        let malformed = || format!("malformed member in struct `{}`", structure);

        // The first declarator carries the type, e.g. `float4 diffuse` in `float4 diffuse, specular`.
        let first = declarators.next().unwrap_or(&[]);
        let name_index = match first
            .iter()
            .position(|t| matches!(t, Token::Colon | Token::LBracket))
        {
            Some(end) => end.checked_sub(1),
            None => first.len().checked_sub(1),
        };
        let name_index = match name_index {
            Some(index) if index > 0 => index,
            _ => return self.error(malformed()),
        };
        let type_name = type_text(&first[..name_index]);

        let mut members = Vec::new();
        for declarator in std::iter::once(&first[name_index..]).chain(declarators) {
            let name = match declarator.first().and_then(Token::ident) {
                Some(name) => name.to_string(),
                None => return self.error(malformed()),
            };
            let semantic = match declarator.get(1..3) {
                Some([Token::Colon, Token::Ident(semantic)]) => Some(semantic.clone()),
                _ => None,
            };
            members.push(StructMember {
                name,
                type_name: type_name.clone(),
                semantic,
            });
        }
        Ok(members)
    }
}

fn push_last(groups: &mut Vec<Vec<Token>>, token: Token) {
    if let Some(group) = groups.last_mut() {
        group.push(token);
    }
}

/// Re-assembles type tokens into source text, with spaces only between adjacent words.
fn type_text(tokens: &[Token]) -> String {
    let mut text = String::new();
    let mut previous_was_word = false;
    for token in tokens {
        if let Some(word) = token.ident() {
            if MODIFIERS.contains(&word) {
                continue;
            }
        }
        if token.is_word() && previous_was_word {
            text.push(' ');
        }
        text.push_str(token.text());
        previous_was_word = token.is_word();
    }
    text
}
