//! Selection facade
//!
//! A [`Selector`] owns the configuration and the compiled artifacts derived
//! from it: the assembled grammar, the parser, the AST builder and the
//! flattened macro map. Editing a macro or keyword recompiles everything
//! from the edited configuration and swaps the new snapshot in only when
//! compilation succeeded; a failed edit leaves the selector untouched.

use crate::ast::Node;
use crate::backend::Structure;
use crate::builder::AstBuilder;
use crate::config::{SelectionConfig, TokenEntry};
use crate::error::{ConfigError, MacroError, Result};
use crate::eval::Evaluator;
use crate::grammar::{assemble, AssembledGrammar};
use crate::macros::MacroMap;
use crate::parser::{CompiledParser, ParseTree, StartRule};
use std::sync::Arc;
use tracing::info;

/// Everything compiled from one configuration
#[derive(Debug)]
pub struct CompiledSelection {
    pub grammar: AssembledGrammar,
    pub parser: CompiledParser,
    pub builder: AstBuilder,
    pub macros: MacroMap,
}

impl CompiledSelection {
    pub fn new(config: &SelectionConfig) -> Result<Self> {
        let grammar = assemble(&config.grammar_template, &config.macros, &config.keywords)?;
        let parser = CompiledParser::new(&grammar.text, Some(&grammar.fallback))?;
        Ok(Self {
            builder: AstBuilder::new(&config.macros, &config.keywords),
            macros: MacroMap::new(&config.macros, config.max_macro_depth),
            grammar,
            parser,
        })
    }

    /// Parse and build without expanding macros
    pub fn build_raw(&self, text: &str, start: StartRule) -> Result<Node> {
        let tree = self.parser.parse(text, start)?;
        Ok(self.builder.build(&tree)?)
    }

    /// Parse, build and expand every macro reference
    pub fn build(&self, text: &str, start: StartRule) -> Result<Node> {
        let node = self.build_raw(text, start)?;
        let parse = |expansion: &str| self.build_raw(expansion, StartRule::Expression);
        Ok(self.macros.expand_ast(node, &parse)?)
    }
}

/// Compiles, expands and evaluates selections
#[derive(Debug, Clone)]
pub struct Selector {
    config: SelectionConfig,
    active: Arc<CompiledSelection>,
}

impl Selector {
    pub fn new(config: SelectionConfig) -> Result<Self> {
        let active = Arc::new(CompiledSelection::new(&config)?);
        Ok(Self { config, active })
    }

    /// A selector over the embedded grammar, macros and keywords
    pub fn embedded() -> Result<Self> {
        Self::new(SelectionConfig::embedded()?)
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// The active compiled snapshot; stays valid across later edits
    pub fn snapshot(&self) -> Arc<CompiledSelection> {
        Arc::clone(&self.active)
    }

    /// The fully assembled grammar text
    pub fn grammar_text(&self) -> &str {
        &self.active.grammar.text
    }

    /// Parse a complete selection
    pub fn parse(&self, text: &str) -> Result<ParseTree> {
        Ok(self.active.parser.parse(text, StartRule::Selection)?)
    }

    /// Parse from a chosen entry rule
    pub fn parse_with(&self, text: &str, start: StartRule) -> Result<ParseTree> {
        Ok(self.active.parser.parse(text, start)?)
    }

    /// Parse, build the AST and expand macros
    pub fn build(&self, text: &str) -> Result<Node> {
        self.active.build(text, StartRule::Selection)
    }

    /// Canonical rendering of the expanded AST
    pub fn symbolic(&self, text: &str) -> Result<String> {
        Ok(self.build(text)?.symbolic())
    }

    /// String expansion of one macro
    pub fn expand_macro(&self, name: &str) -> Result<String> {
        Ok(self.active.macros.expand_str(name)?)
    }

    /// Per-row mask of the rows `text` selects
    pub fn mask<S: Structure>(&self, text: &str, structure: &S) -> Result<S::Array> {
        let node = self.build(text)?;
        Ok(Evaluator::new(structure).mask(&node)?)
    }

    /// The sub-structure of the rows `text` selects
    pub fn select<S: Structure>(&self, text: &str, structure: &S) -> Result<S> {
        let node = self.build(text)?;
        Ok(Evaluator::new(structure).select(&node)?)
    }

    /// Declare a new macro
    pub fn add_macro(&mut self, category: &str, name: &str, definition: &str) -> Result<()> {
        if self.config.macros.contains(name) {
            return Err(MacroError::AlreadyDefined {
                name: name.to_string(),
            }
            .into());
        }
        self.set_macro(category, name, definition)
    }

    /// Declare or replace a macro
    pub fn set_macro(&mut self, category: &str, name: &str, definition: &str) -> Result<()> {
        if definition.trim().is_empty() {
            return Err(MacroError::EmptyDefinition {
                name: name.to_string(),
            }
            .into());
        }
        let mut config = self.config.clone();
        match config.macros.remove(name) {
            Some(existing) => {
                let entry = TokenEntry {
                    definition: Some(definition.to_string()),
                    ..existing
                };
                config.macros.category_mut(category).insert(name, entry);
            }
            None => {
                config
                    .macros
                    .category_mut(category)
                    .insert(name, TokenEntry::macro_definition(definition));
            }
        }
        self.swap(config)?;
        info!(category, name, definition, "Set macro");
        Ok(())
    }

    pub fn remove_macro(&mut self, name: &str) -> Result<()> {
        let mut config = self.config.clone();
        if config.macros.remove(name).is_none() {
            return Err(MacroError::Undefined {
                name: name.to_string(),
            }
            .into());
        }
        self.swap(config)?;
        info!(name, "Removed macro");
        Ok(())
    }

    /// Declare a selectable keyword
    pub fn add_keyword(&mut self, category: &str, name: &str, entry: TokenEntry) -> Result<()> {
        if self.config.keywords.contains(name) {
            return Err(ConfigError::DuplicateKeyword(name.to_string()).into());
        }
        let mut config = self.config.clone();
        config.keywords.category_mut(category).insert(name, entry);
        self.swap(config)?;
        info!(category, name, "Added keyword");
        Ok(())
    }

    pub fn remove_keyword(&mut self, name: &str) -> Result<()> {
        let mut config = self.config.clone();
        if config.keywords.remove(name).is_none() {
            return Err(ConfigError::UnknownKeyword(name.to_string()).into());
        }
        self.swap(config)?;
        info!(name, "Removed keyword");
        Ok(())
    }

    fn swap(&mut self, config: SelectionConfig) -> Result<()> {
        let compiled = CompiledSelection::new(&config)?;
        self.config = config;
        self.active = Arc::new(compiled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, EvalError, ParseError};
    use crate::testing::sample;
    use rstest::rstest;

    fn selector() -> Selector {
        Selector::embedded().unwrap()
    }

    fn rows(selector: &Selector, text: &str) -> Vec<usize> {
        selector.select(text, &sample()).unwrap().index
    }

    #[rstest]
    #[case("name CA and resname ALA", vec![1])]
    #[case("name CA CB", vec![1, 2, 4])]
    #[case("resid 1 to 4", vec![0, 1, 2, 3, 4, 5, 6])]
    #[case("resnum 2:5:3", vec![3, 4, 7])]
    #[case("protein", vec![0, 1, 2, 3, 4])]
    #[case("water or heme", vec![5, 6, 7])]
    #[case("not protein and x > 5", vec![5, 6])]
    #[case("within 5 of water", vec![0, 1, 2, 3, 4, 6, 7])]
    #[case("exwithin 5 of water", vec![5])]
    #[case("same resid as name CB", vec![0, 1, 2])]
    #[case("backbone", vec![0, 1, 3, 4])]
    #[case("name =~ \"^C\"", vec![1, 2, 4])]
    #[case("resname /^H/ and not water", vec![5])]
    #[case("chain A xor resid 1", vec![3, 4])]
    #[case("sq(x) + sq(y) <= 5", vec![0, 1, 2])]
    #[case("index >= 6 || name FE", vec![5, 6, 7])]
    #[case("name 'FE'", vec![5])]
    #[case("nothing or all", vec![0, 1, 2, 3, 4, 5, 6, 7])]
    #[case("WITHIN 5 OF water", vec![0, 1, 2, 3, 4, 6, 7])]
    #[case("SAME resid AS name CB", vec![0, 1, 2])]
    #[case("abs(resid - 4) == 1", vec![5, 7])]
    #[case("-(-9223372036854775807 - 1) > 0", vec![0, 1, 2, 3, 4, 5, 6, 7])]
    #[case("(-9223372036854775807 - 1) % -1 == 0", vec![0, 1, 2, 3, 4, 5, 6, 7])]
    #[case("(-9223372036854775807 - 1) // -1 > 0", vec![0, 1, 2, 3, 4, 5, 6, 7])]
    fn test_end_to_end(#[case] text: &str, #[case] expected: Vec<usize>) {
        assert_eq!(rows(&selector(), text), expected);
    }

    #[test]
    fn test_within_water_without_water_is_empty() {
        let structure = sample().select(&crate::testing::RowArray::new(
            (0..8).map(|i| (i < 6).into()).collect(),
            (0..8).collect(),
        ));
        let selected = selector().select("within 5 of water", &structure).unwrap();
        assert!(selected.index.is_empty());
    }

    #[test]
    fn test_symbolic_after_expansion() {
        let selector = selector();
        assert_eq!(
            selector.symbolic("ion").unwrap(),
            r#"Start(PropertySelection(SelectionKeyword("resname"), [StringValue("NA"), StringValue("CL"), StringValue("K"), StringValue("MG"), StringValue("CA"), StringValue("ZN"), StringValue("MN"), StringValue("FE"), StringValue("CU"), StringValue("SOD"), StringValue("CLA"), StringValue("POT"), StringValue("CAL")]))"#
        );
        assert_eq!(
            selector.expand_macro("calpha").unwrap(),
            format!(
                "({}) and name CA",
                selector.config().macros.find("protein").unwrap().2.definition.clone().unwrap()
            )
        );
    }

    #[test]
    fn test_errors_surface_by_stage() {
        let selector = selector();
        assert!(matches!(
            selector.build("name CA and"),
            Err(Error::Parse(ParseError::UnexpectedEnd { .. }))
        ));
        assert!(matches!(
            selector.mask("occupancy > 1", &sample()),
            Err(Error::Eval(EvalError::UnknownColumn(_)))
        ));
        assert!(matches!(
            selector.mask("sequence ACDE", &sample()),
            Err(Error::Eval(EvalError::NotImplemented(_)))
        ));
        assert!(matches!(
            selector.mask("resid 1:5:0", &sample()),
            Err(Error::Eval(EvalError::InvalidRange(_)))
        ));
        assert!(matches!(
            selector.expand_macro("nope"),
            Err(Error::Macro(MacroError::Undefined { .. }))
        ));
    }

    #[test]
    fn test_macro_mutations_rebuild_the_grammar() {
        let mut selector = selector();
        let before = selector.snapshot();

        selector.add_macro("custom", "alanine", "resname ALA").unwrap();
        assert!(selector.grammar_text().contains("ALANINE : \"alanine\""));
        assert_eq!(rows(&selector, "alanine and name N"), vec![0]);
        // Earlier snapshots are unaffected
        assert!(!before.grammar.text.contains("ALANINE"));

        assert!(matches!(
            selector.add_macro("custom", "alanine", "resname GLY"),
            Err(Error::Macro(MacroError::AlreadyDefined { .. }))
        ));

        selector.set_macro("custom", "alanine", "resname GLY").unwrap();
        assert_eq!(rows(&selector, "alanine"), vec![3, 4]);

        selector.remove_macro("alanine").unwrap();
        assert!(!selector.grammar_text().contains("ALANINE"));
        assert!(matches!(
            selector.remove_macro("alanine"),
            Err(Error::Macro(MacroError::Undefined { .. }))
        ));
    }

    #[test]
    fn test_cyclic_macros_fail_at_depth_limit() {
        let mut selector = selector();
        selector.add_macro("loop", "ma", "mb").unwrap();
        selector.add_macro("loop", "mb", "mc").unwrap();
        selector.add_macro("loop", "mc", "ma").unwrap();
        for name in ["ma", "mb", "mc"] {
            assert!(matches!(
                selector.build(name),
                Err(Error::Macro(MacroError::RecursionLimit { depth: 10, .. }))
            ));
        }
    }

    #[test]
    fn test_keyword_mutations() {
        let mut selector = selector();
        selector
            .add_keyword("atom", "radius", TokenEntry::default().with_synonyms(["rad"]))
            .unwrap();
        assert_eq!(
            selector.symbolic("rad > 1").unwrap(),
            r#"Start((SelectionKeyword("radius")) > (Number("1")))"#
        );
        assert!(matches!(
            selector.add_keyword("atom", "rad", TokenEntry::default()),
            Err(Error::Config(ConfigError::DuplicateKeyword(_)))
        ));

        selector.remove_keyword("radius").unwrap();
        assert!(matches!(
            selector.remove_keyword("radius"),
            Err(Error::Config(ConfigError::UnknownKeyword(_)))
        ));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_state() {
        let mut selector = selector();
        let before = selector.grammar_text().to_string();
        // A pattern the regex engine rejects
        let entry = TokenEntry {
            regex_substitution: [("broken".to_string(), "(?!x)".to_string())].into(),
            ..TokenEntry::default()
        };
        assert!(matches!(
            selector.add_keyword("atom", "broken", entry),
            Err(Error::Grammar(_))
        ));
        assert_eq!(selector.grammar_text(), before);
        assert!(!selector.config().keywords.contains("broken"));
    }
}
