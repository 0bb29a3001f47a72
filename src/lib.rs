//! HTML Language Server with embedded CSS and JavaScript support.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod custom_data;
mod document;
mod embedded;
mod errors;
mod language;
mod lsp;
mod settings;

pub use custom_data::{
    load_custom_data, AttributeData, CustomDataProvider, DataSourceReader, Description,
    FileSystemReader, HtmlData, HttpReader, SourceReader, TagData, ValueData, ValueSet,
};
pub use document::{
    CacheConfig, DocumentCache, DocumentRegions, DocumentStore, LanguageRange, LineIndex, Region,
    RegionIndex, TextDocument,
};
pub use embedded::{extract_regions, ExtractedRegions, Scanner, Token, TokenKind};
pub use errors::{CustomDataError, EditError, LanguageParseError, RegistryError};
pub use language::Language;
pub use lsp::{
    apply_edits, create_mapping, encode_tokens, format, limit_folding_ranges, remap_modifiers,
    BackendRegistry, DocumentView, LanguageBackend, LegendMapping, MarkupBackend, Multiplexer,
    SemanticTokenEntry, SemanticTokenUnifier,
};
pub use settings::{discover_settings, load_settings, Settings};

/// Builds the backends for a workspace from its settings and settings directory.
pub type RegistryFactory = dyn Fn(&Settings, &Path) -> BackendRegistry + Send + Sync;

/// Everything derived from the workspace settings at initialization.
struct Session {
    multiplexer: Multiplexer,
    tokens: SemanticTokenUnifier,
    sweeper: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    factory: Arc<RegistryFactory>,
    session: OnceLock<Session>,
}

impl Backend {
    pub(crate) fn new(client: Client, factory: Arc<RegistryFactory>) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            factory,
            session: OnceLock::new(),
        }
    }

    /// Run `f` on an open document, once the session is initialized.
    fn with_document<R>(
        &self,
        uri: &Url,
        f: impl FnOnce(&Session, &TextDocument) -> R,
    ) -> Option<R> {
        let Some(session) = self.session.get() else {
            tracing::debug!(%uri, "request before initialize");
            return None;
        };
        let Some(document) = self.documents.get(uri) else {
            tracing::debug!(%uri, "request for unknown document");
            return None;
        };
        Some(f(session, &document))
    }

    /// Validate a document and publish the diagnostics.
    async fn publish_diagnostics_for(&self, document: &TextDocument) {
        let Some(session) = self.session.get() else {
            return;
        };
        let diagnostics = session.multiplexer.diagnostics(document);
        self.client
            .publish_diagnostics(
                document.uri().clone(),
                diagnostics,
                Some(document.version()),
            )
            .await;
    }

    fn format_range(
        &self,
        uri: &Url,
        range: Option<Range>,
        options: &FormattingOptions,
    ) -> Option<Vec<TextEdit>> {
        self.with_document(uri, |session, document| {
            let range = range.unwrap_or_else(|| document.full_range());
            match lsp::format(&session.multiplexer, document, range, options) {
                Ok(edits) => Some(edits),
                Err(e) => {
                    tracing::warn!(%uri, "formatting failed: {e}");
                    None
                }
            }
        })
        .flatten()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Extract workspace root from params
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            })
            .unwrap_or_else(|| PathBuf::from("."));

        // Discover settings by walking up the directory tree
        let (settings, settings_dir) = settings::discover_settings(&workspace_root);
        settings.warn_unknown_languages();
        // Loading custom data may block on file or network reads.
        let factory = Arc::clone(&self.factory);
        let factory_settings = settings.clone();
        let registry =
            tokio::task::spawn_blocking(move || factory(&factory_settings, &settings_dir))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("building language backends failed: {e}");
                    BackendRegistry::new()
                });
        let tokens = SemanticTokenUnifier::new(&registry);
        let legend = tokens.legend().clone();
        let multiplexer = Multiplexer::new(registry, settings);
        let sweeper = multiplexer.cache().spawn_sweeper();
        tracing::info!(
            root = %workspace_root.display(),
            backends = multiplexer.registry().len(),
            "initialized"
        );
        if self
            .session
            .set(Session {
                multiplexer,
                tokens,
                sweeper,
            })
            .is_err()
        {
            tracing::warn!("initialize received twice, keeping the first session");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["<".to_string()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Left(true)),
                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                selection_range_provider: Some(SelectionRangeProviderCapability::Simple(true)),
                color_provider: Some(ColorProviderCapability::Simple(true)),
                linked_editing_range_provider: Some(
                    LinkedEditingRangeServerCapabilities::Simple(true),
                ),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend,
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: Some(true),
                            work_done_progress_options: WorkDoneProgressOptions::default(),
                        },
                    ),
                ),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "HTML language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        let document = self
            .documents
            .open(item.uri, item.language_id, item.text, item.version);
        self.publish_diagnostics_for(&document).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        let Some(change) = params.content_changes.into_iter().next() else {
            return;
        };
        let uri = params.text_document.uri;
        match self
            .documents
            .update(&uri, change.text, params.text_document.version)
        {
            Some(document) => self.publish_diagnostics_for(&document).await,
            None => tracing::warn!(%uri, "change for a document that was never opened"),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.close(&uri);
        if let Some(session) = self.session.get() {
            session.multiplexer.remove_document(&uri);
        }
        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position.position;
        Ok(self.with_document(
            &params.text_document_position.text_document.uri,
            |session, document| {
                CompletionResponse::List(session.multiplexer.complete(document, position))
            },
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params.position;
        Ok(self
            .with_document(
                &params.text_document_position_params.text_document.uri,
                |session, document| session.multiplexer.hover(document, position),
            )
            .flatten())
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params.position;
        Ok(self
            .with_document(
                &params.text_document_position_params.text_document.uri,
                |session, document| session.multiplexer.signature_help(document, position),
            )
            .flatten())
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        Ok(self
            .with_document(
                &params.text_document_position_params.text_document.uri,
                |session, document| session.multiplexer.definition(document, position),
            )
            .filter(|locations| !locations.is_empty())
            .map(GotoDefinitionResponse::Array))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position.position;
        Ok(self.with_document(
            &params.text_document_position.text_document.uri,
            |session, document| session.multiplexer.references(document, position),
        ))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let position = params.text_document_position.position;
        Ok(self
            .with_document(
                &params.text_document_position.text_document.uri,
                |session, document| {
                    session
                        .multiplexer
                        .rename(document, position, &params.new_name)
                },
            )
            .flatten())
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            session.multiplexer.document_links(document)
        }))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            DocumentSymbolResponse::Flat(session.multiplexer.document_symbols(document))
        }))
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> Result<Option<Vec<SymbolInformation>>> {
        Ok(self
            .session
            .get()
            .map(|session| session.multiplexer.workspace_symbols(&params.query)))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            session.multiplexer.folding_ranges(document)
        }))
    }

    async fn selection_range(
        &self,
        params: SelectionRangeParams,
    ) -> Result<Option<Vec<SelectionRange>>> {
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            session
                .multiplexer
                .selection_ranges(document, &params.positions)
        }))
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        Ok(self
            .with_document(&params.text_document.uri, |session, document| {
                session.multiplexer.document_colors(document)
            })
            .unwrap_or_default())
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        Ok(self
            .with_document(&params.text_document.uri, |session, document| {
                session
                    .multiplexer
                    .color_presentations(document, params.color, params.range)
            })
            .unwrap_or_default())
    }

    async fn linked_editing_range(
        &self,
        params: LinkedEditingRangeParams,
    ) -> Result<Option<LinkedEditingRanges>> {
        let position = params.text_document_position_params.position;
        Ok(self
            .with_document(
                &params.text_document_position_params.text_document.uri,
                |session, document| session.multiplexer.linked_editing_ranges(document, position),
            )
            .flatten()
            .map(|ranges| LinkedEditingRanges {
                ranges,
                word_pattern: None,
            }))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        Ok(self.format_range(&params.text_document.uri, None, &params.options))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        Ok(self.format_range(
            &params.text_document.uri,
            Some(params.range),
            &params.options,
        ))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            let data = session
                .tokens
                .semantic_tokens(&session.multiplexer, document, None);
            SemanticTokensResult::Tokens(SemanticTokens {
                result_id: None,
                data,
            })
        }))
    }

    async fn semantic_tokens_range(
        &self,
        params: SemanticTokensRangeParams,
    ) -> Result<Option<SemanticTokensRangeResult>> {
        let ranges = [params.range];
        Ok(self.with_document(&params.text_document.uri, |session, document| {
            let data =
                session
                    .tokens
                    .semantic_tokens(&session.multiplexer, document, Some(&ranges));
            SemanticTokensRangeResult::Tokens(SemanticTokens {
                result_id: None,
                data,
            })
        }))
    }
}

/// The registry used by the server binary: the built-in markup backend fed
/// with the configured custom data.
pub fn default_registry(settings: &Settings, settings_dir: &Path) -> BackendRegistry {
    let reader = SourceReader::new(settings_dir);
    let providers = load_custom_data(&settings.custom_data.sources, &reader);
    let mut registry = BackendRegistry::new();
    if let Err(e) = registry.register(Arc::new(MarkupBackend::new(providers))) {
        tracing::warn!("{e}");
    }
    registry
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    create_service_with(default_registry)
}

/// Create a service whose backends come from `factory`.
pub fn create_service_with(
    factory: impl Fn(&Settings, &Path) -> BackendRegistry + Send + Sync + 'static,
) -> (LspService<Backend>, tower_lsp::ClientSocket) {
    let factory: Arc<RegistryFactory> = Arc::new(factory);
    LspService::new(move |client| Backend::new(client, Arc::clone(&factory)))
}
