// src/models/field.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- ENUMS ---

/// Os tipos de campo que um stage pode oferecer no formulário de card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    // "select" era o nome antigo no frontend; aceitamos os dois na leitura.
    #[serde(alias = "select")]
    Dropdown,
    Checkbox,
    CheckboxList,
    Progress,
    Textarea,
}

impl FieldType {
    /// Tipos que não fazem sentido sem uma lista de opções.
    pub fn requires_options(self) -> bool {
        matches!(
            self,
            FieldType::Dropdown | FieldType::CheckboxList | FieldType::Progress
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
    Readonly,
}

// --- VALORES ---

/// O valor de um campo em um card, discriminado pelo `FieldType` declarado.
///
/// No JSON continua sendo o formato "cru" que a UI sempre usou
/// (string | number | boolean | string[] | boolean[]); a checagem de
/// compatibilidade com o tipo declarado acontece em `Field::validate_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    // BoolList antes de TextList: `[true, false]` precisa casar aqui.
    BoolList(Vec<bool>),
    TextList(Vec<String>),
    Text(String),
}

impl FieldValue {
    /// Um valor "vazio" não satisfaz um campo obrigatório.
    ///
    /// Booleanos e números nunca são vazios: `false` e `0` são respostas
    /// válidas (diferente do antigo check de truthiness no frontend).
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::TextList(itens) => itens.is_empty(),
            FieldValue::BoolList(itens) => itens.is_empty(),
            FieldValue::Bool(_) | FieldValue::Number(_) => false,
        }
    }
}

// --- VALIDAÇÃO ---

/// Limites opcionais checados na submissão do card (não na definição do campo).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

// --- DEFINIÇÃO (O Molde) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "Responsável")]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    // Opções para dropdown/checkbox-list/progress (Ex: ["P", "M", "G"]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    // Referência a outro campo do qual este depende (apenas informativo).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Uuid>,
    #[serde(default)]
    pub order: i32,
    // Preenchido somente em cópias herdadas: aponta para o stage de origem.
    // Nunca forma ciclo, pois só referencia stages anteriores na ordem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_stage: Option<Uuid>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl Field {
    /// Valor inicial derivado do tipo, usado quando o card é criado sem
    /// preencher o campo e não há `default_value` explícito.
    pub fn default_for_type(field_type: FieldType, options: &[String]) -> FieldValue {
        match field_type {
            FieldType::CheckboxList => FieldValue::TextList(Vec::new()),
            FieldType::Progress => FieldValue::BoolList(vec![false; options.len()]),
            FieldType::Checkbox => FieldValue::Bool(false),
            FieldType::Number => FieldValue::Number(0.0),
            _ => FieldValue::Text(String::new()),
        }
    }

    /// O valor que um card novo recebe para este campo quando nada é enviado.
    pub fn initial_value(&self) -> FieldValue {
        self.default_value.clone().unwrap_or_else(|| {
            Self::default_for_type(self.field_type, self.options.as_deref().unwrap_or(&[]))
        })
    }

    fn options_or_empty(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    /// Checagens feitas ao salvar a definição do campo.
    ///
    /// Limites numéricos e de tamanho NÃO são checados aqui: eles valem
    /// para os valores submetidos nos cards, não para o molde.
    pub fn validate_definition(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidFieldDefinition(
                "o nome do campo é obrigatório".to_string(),
            ));
        }

        if self.field_type.requires_options() && self.options_or_empty().is_empty() {
            return Err(AppError::InvalidFieldDefinition(format!(
                "o campo '{}' precisa de ao menos uma opção",
                self.name
            )));
        }

        // O valor padrão, se existir, precisa ser compatível com o tipo.
        if let Some(default) = &self.default_value {
            if !default.is_empty() {
                self.check_type(default)?;
            }
        }

        Ok(())
    }

    /// Valida um valor submetido contra o tipo declarado e os limites
    /// opcionais. Valores vazios passam aqui; obrigatoriedade é checada
    /// separadamente contra o conjunto efetivo do stage.
    pub fn validate_value(&self, value: &FieldValue) -> Result<(), AppError> {
        if value.is_empty() {
            return Ok(());
        }
        self.check_type(value)?;
        self.check_bounds(value)
    }

    fn invalid(&self, reason: impl Into<String>) -> AppError {
        AppError::InvalidFieldValue {
            field: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn check_type(&self, value: &FieldValue) -> Result<(), AppError> {
        match self.field_type {
            FieldType::Text | FieldType::Textarea => match value {
                FieldValue::Text(_) => Ok(()),
                _ => Err(self.invalid("esperado texto")),
            },
            FieldType::Number => match value {
                FieldValue::Number(_) => Ok(()),
                _ => Err(self.invalid("esperado número")),
            },
            FieldType::Date => match value {
                // Padronizado: datas trafegam como string ISO (YYYY-MM-DD).
                FieldValue::Text(s) => {
                    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map(|_| ())
                        .map_err(|_| self.invalid("esperada data no formato YYYY-MM-DD"))
                }
                _ => Err(self.invalid("esperada data no formato YYYY-MM-DD")),
            },
            FieldType::Dropdown => match value {
                FieldValue::Text(s) if self.options_or_empty().contains(s) => Ok(()),
                FieldValue::Text(_) => Err(self.invalid("valor fora das opções")),
                _ => Err(self.invalid("esperada uma das opções")),
            },
            FieldType::Checkbox => match value {
                FieldValue::Bool(_) => Ok(()),
                _ => Err(self.invalid("esperado booleano")),
            },
            FieldType::CheckboxList => match value {
                FieldValue::TextList(itens) => {
                    let options = self.options_or_empty();
                    match itens.iter().find(|item| !options.contains(item)) {
                        Some(extra) => {
                            Err(self.invalid(format!("'{extra}' não está nas opções")))
                        }
                        None => Ok(()),
                    }
                }
                _ => Err(self.invalid("esperada lista de opções")),
            },
            FieldType::Progress => match value {
                FieldValue::BoolList(itens) if itens.len() == self.options_or_empty().len() => {
                    Ok(())
                }
                FieldValue::BoolList(_) => Err(self.invalid(format!(
                    "esperada lista de {} booleanos",
                    self.options_or_empty().len()
                ))),
                _ => Err(self.invalid("esperada lista de booleanos")),
            },
        }
    }

    fn check_bounds(&self, value: &FieldValue) -> Result<(), AppError> {
        let Some(validation) = &self.validation else {
            return Ok(());
        };

        match value {
            FieldValue::Number(n) => {
                if let Some(min) = validation.min {
                    if *n < min {
                        return Err(self.invalid(format!("valor mínimo é {min}")));
                    }
                }
                if let Some(max) = validation.max {
                    if *n > max {
                        return Err(self.invalid(format!("valor máximo é {max}")));
                    }
                }
            }
            FieldValue::Text(s) => {
                let tamanho = s.chars().count();
                if let Some(min) = validation.min_length {
                    if tamanho < min {
                        return Err(self.invalid(format!("tamanho mínimo é {min}")));
                    }
                }
                if let Some(max) = validation.max_length {
                    if tamanho > max {
                        return Err(self.invalid(format!("tamanho máximo é {max}")));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}
