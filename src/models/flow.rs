// src/models/flow.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::field::{Field, FieldValue, Visibility};

/// Mapa nome-do-campo -> valor, como o frontend sempre enviou.
pub type FieldValues = BTreeMap<String, FieldValue>;

// --- HISTÓRICO ---

/// Referência de stage congelada no momento do movimento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageRef {
    pub stage_id: Uuid,
    pub stage_name: String,
}

/// Entrada do histórico de um card. Append-only: nunca é editada nem
/// reordenada depois de escrita.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardHistory {
    pub date: DateTime<Utc>,
    pub from: StageRef,
    pub to: StageRef,
    // Snapshot copiado dos valores no momento do movimento.
    pub fields: FieldValues,
}

// --- CARD ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    #[schema(example = "Revisar proposta")]
    pub title: String,
    pub fields: FieldValues,
    pub stage_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<CardHistory>,
}

// --- STAGE ---

/// Configuração de campos de um stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(default)]
    pub inherit_fields: bool,
    // Nomes de campos obrigatórios neste stage, além dos `required` de cada campo.
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub hidden_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: Uuid,
    #[schema(example = "Backlog")]
    pub name: String,
    // Ordem total entre os stages do flow; empates resolvem pela posição no array.
    pub order: i32,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub field_config: FieldConfig,
    // None = qualquer destino permitido; lista vazia = nenhum movimento.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_moves: Option<Vec<Uuid>>,
    // Ordem manual do kanban, não ordem de criação.
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Stage {
    fn new(name: &str, order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            order,
            fields: Vec::new(),
            field_config: FieldConfig::default(),
            allowed_moves: None,
            cards: Vec::new(),
        }
    }
}

/// Atualização parcial de um stage (campos ausentes ficam como estão).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub fields: Option<Vec<Field>>,
    pub field_config: Option<FieldConfig>,
    pub allowed_moves: Option<Vec<Uuid>>,
}

/// O que fazer com os cards de um stage que está sendo excluído.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StageDeletePolicy {
    /// Exclui os cards junto com o stage (comportamento padrão).
    #[default]
    Cascade,
    /// Recusa a exclusão enquanto o stage tiver cards.
    Reject,
    /// Migra os cards para o stage adjacente (o anterior na ordem, senão o próximo).
    Migrate,
}

// --- FLOW (A Raiz) ---

/// O agregado completo de um workflow. Toda mutação de stage ou card passa
/// por aqui, para que os contadores derivados nunca fiquem defasados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: Uuid,
    #[schema(example = "Funil de Vendas")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    // Contador derivado: total de cards somando todos os stages.
    // Recalculado em toda mutação estrutural, nunca mantido na mão.
    #[serde(default)]
    pub cards: u32,
    #[serde(default)]
    pub members: u32,
    #[serde(default)]
    pub stages: Vec<Stage>,
    // Campos de nível de flow, disponíveis em todos os stages.
    #[serde(default)]
    pub fields: Vec<Field>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Versão para checagem otimista no armazenamento.
    #[serde(default)]
    pub version: i64,
}

impl Flow {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            cards: 0,
            members: 0,
            stages: Vec::new(),
            fields: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Recalcula o contador derivado de cards.
    pub fn recount_cards(&mut self) {
        self.cards = self.stages.iter().map(|s| s.cards.len() as u32).sum();
    }

    // --- LOOKUPS ---

    fn stage_position(&self, stage_id: Uuid) -> Result<usize, AppError> {
        self.stages
            .iter()
            .position(|s| s.id == stage_id)
            .ok_or(AppError::StageNotFound)
    }

    pub fn stage(&self, stage_id: Uuid) -> Result<&Stage, AppError> {
        self.stages
            .iter()
            .find(|s| s.id == stage_id)
            .ok_or(AppError::StageNotFound)
    }

    /// Localiza um card em qualquer stage do flow.
    pub fn card(&self, card_id: Uuid) -> Result<&Card, AppError> {
        self.stages
            .iter()
            .flat_map(|s| s.cards.iter())
            .find(|c| c.id == card_id)
            .ok_or(AppError::CardNotFound)
    }

    /// Posições dos stages em ordem de exibição: `order` crescente,
    /// empates resolvidos pela posição no array.
    fn ordered_positions(&self) -> Vec<usize> {
        let mut posicoes: Vec<usize> = (0..self.stages.len()).collect();
        posicoes.sort_by_key(|&i| (self.stages[i].order, i));
        posicoes
    }

    /// Stages do flow em ordem de exibição.
    pub fn ordered_stages(&self) -> Vec<Stage> {
        self.ordered_positions()
            .into_iter()
            .map(|i| self.stages[i].clone())
            .collect()
    }

    /// Stages estritamente anteriores ao stage dado, em ordem crescente.
    fn earlier_positions(&self, stage_pos: usize) -> Vec<usize> {
        let chave = (self.stages[stage_pos].order, stage_pos);
        self.ordered_positions()
            .into_iter()
            .filter(|&i| (self.stages[i].order, i) < chave)
            .collect()
    }

    // --- STAGES ---

    /// Adiciona um stage no fim do flow e devolve seu id.
    pub fn add_stage(&mut self, name: &str) -> Result<Uuid, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::NameRequired);
        }
        let stage = Stage::new(name.trim(), self.stages.len() as i32);
        let id = stage.id;
        self.stages.push(stage);
        self.touch();
        Ok(id)
    }

    pub fn update_stage(&mut self, stage_id: Uuid, update: StageUpdate) -> Result<(), AppError> {
        if let Some(fields) = &update.fields {
            for field in fields {
                field.validate_definition()?;
            }
        }

        let pos = self.stage_position(stage_id)?;
        let stage = &mut self.stages[pos];

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::NameRequired);
            }
            stage.name = name.trim().to_string();
        }
        if let Some(order) = update.order {
            stage.order = order;
        }
        if let Some(fields) = update.fields {
            stage.fields = fields;
        }
        if let Some(config) = update.field_config {
            stage.field_config = config;
        }
        if let Some(allowed) = update.allowed_moves {
            stage.allowed_moves = Some(allowed);
        }

        self.touch();
        Ok(())
    }

    /// Exclui um stage aplicando a política escolhida para os cards dele.
    pub fn remove_stage(
        &mut self,
        stage_id: Uuid,
        policy: StageDeletePolicy,
    ) -> Result<(), AppError> {
        let pos = self.stage_position(stage_id)?;

        match policy {
            StageDeletePolicy::Cascade => {
                self.stages.remove(pos);
            }
            StageDeletePolicy::Reject => {
                if !self.stages[pos].cards.is_empty() {
                    return Err(AppError::StageNotEmpty);
                }
                self.stages.remove(pos);
            }
            StageDeletePolicy::Migrate => {
                // Destino: o stage anterior na ordem de exibição; se o stage
                // excluído for o primeiro, o próximo. Sem destino, a migração
                // é impossível e a exclusão é recusada.
                let ordenados = self.ordered_positions();
                let idx = ordenados.iter().position(|&i| i == pos).unwrap_or(0);
                let destino = if idx > 0 {
                    Some(ordenados[idx - 1])
                } else {
                    ordenados.get(1).copied()
                };

                let destino_id = match destino {
                    Some(i) => self.stages[i].id,
                    None if self.stages[pos].cards.is_empty() => {
                        self.stages.remove(pos);
                        self.recount_cards();
                        self.touch();
                        return Ok(());
                    }
                    None => return Err(AppError::StageNotEmpty),
                };

                let removido = self.stages.remove(pos);
                let origem = StageRef {
                    stage_id: removido.id,
                    stage_name: removido.name.clone(),
                };
                let destino_pos = self.stage_position(destino_id)?;
                let destino_ref = StageRef {
                    stage_id: destino_id,
                    stage_name: self.stages[destino_pos].name.clone(),
                };

                let now = Utc::now();
                for mut card in removido.cards {
                    card.history.push(CardHistory {
                        date: now,
                        from: origem.clone(),
                        to: destino_ref.clone(),
                        fields: card.fields.clone(),
                    });
                    card.stage_id = destino_id;
                    card.updated_at = now;
                    self.stages[destino_pos].cards.push(card);
                }
            }
        }

        self.recount_cards();
        self.touch();
        Ok(())
    }

    // --- CAMPOS ---

    /// Adiciona um campo de nível de flow, disponível em todos os stages.
    pub fn add_field(&mut self, mut field: Field) -> Result<(), AppError> {
        field.validate_definition()?;
        if field.order == 0 {
            field.order = self.fields.len() as i32;
        }
        self.fields.push(field);
        self.touch();
        Ok(())
    }

    pub fn add_stage_field(&mut self, stage_id: Uuid, mut field: Field) -> Result<(), AppError> {
        field.validate_definition()?;
        let pos = self.stage_position(stage_id)?;
        let stage = &mut self.stages[pos];
        if field.order == 0 {
            field.order = stage.fields.len() as i32;
        }
        stage.fields.push(field);
        self.touch();
        Ok(())
    }

    /// Conjunto efetivo de campos de um stage, calculado sob demanda (nunca
    /// persistido, para não divergir quando um stage anterior mudar).
    ///
    /// Ordem: campos próprios primeiro (pela `order` de cada um), depois os
    /// campos de nível de flow, depois os herdados agrupados por stage de
    /// origem em ordem crescente. Cada cópia herdada sai marcada como
    /// somente leitura e com `source_stage` apontando para a origem.
    pub fn effective_fields(&self, stage_id: Uuid) -> Result<Vec<Field>, AppError> {
        let pos = self.stage_position(stage_id)?;
        let stage = &self.stages[pos];
        let hidden = &stage.field_config.hidden_fields;

        let marca_oculto = |mut field: Field| {
            if hidden.contains(&field.name) {
                field.visibility = Some(Visibility::Hidden);
            }
            field
        };

        let mut proprios: Vec<Field> = stage.fields.iter().cloned().map(marca_oculto).collect();
        proprios.sort_by_key(|f| f.order);

        let mut de_flow: Vec<Field> = self.fields.iter().cloned().map(marca_oculto).collect();
        de_flow.sort_by_key(|f| f.order);

        let mut efetivos = proprios;
        efetivos.append(&mut de_flow);

        if stage.field_config.inherit_fields {
            for origem_pos in self.earlier_positions(pos) {
                let origem = &self.stages[origem_pos];
                let mut herdados: Vec<Field> = origem.fields.iter().cloned().collect();
                herdados.sort_by_key(|f| f.order);
                for mut field in herdados {
                    field.read_only = true;
                    field.source_stage = Some(origem.id);
                    efetivos.push(marca_oculto(field));
                }
            }
        }

        Ok(efetivos)
    }

    /// Nomes dos campos obrigatórios no stage: o flag `required` de cada
    /// campo do conjunto efetivo unido aos `requiredFields` da configuração.
    /// Campos ocultos não entram (não dá para preencher o que não aparece).
    fn required_names(&self, stage_id: Uuid) -> Result<Vec<String>, AppError> {
        let stage = self.stage(stage_id)?;
        let extras = &stage.field_config.required_fields;

        let mut nomes: Vec<String> = Vec::new();
        for field in self.effective_fields(stage_id)? {
            if field.visibility == Some(Visibility::Hidden) {
                continue;
            }
            if (field.required || extras.contains(&field.name)) && !nomes.contains(&field.name) {
                nomes.push(field.name);
            }
        }
        Ok(nomes)
    }

    /// Falha listando os campos obrigatórios sem valor não-vazio.
    fn check_required(&self, stage_id: Uuid, values: &FieldValues) -> Result<(), AppError> {
        let faltando: Vec<String> = self
            .required_names(stage_id)?
            .into_iter()
            .filter(|nome| values.get(nome).map_or(true, FieldValue::is_empty))
            .collect();

        if faltando.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingRequiredFields(faltando))
        }
    }

    /// Checa os valores enviados contra os tipos declarados no conjunto
    /// efetivo. Chaves sem definição correspondente passam sem checagem
    /// (os dados antigos do quadro podem ter campos já removidos).
    fn check_values(&self, stage_id: Uuid, values: &FieldValues) -> Result<(), AppError> {
        let efetivos = self.effective_fields(stage_id)?;
        for (nome, valor) in values {
            if let Some(field) = efetivos.iter().find(|f| &f.name == nome) {
                field.validate_value(valor)?;
            }
        }
        Ok(())
    }

    // --- CARDS ---

    /// Cria um card no stage informado. Campos aplicáveis não enviados
    /// recebem o valor padrão, de forma que o card carregue uma entrada
    /// para cada campo do conjunto efetivo.
    pub fn create_card(
        &mut self,
        stage_id: Uuid,
        title: &str,
        mut values: FieldValues,
    ) -> Result<Uuid, AppError> {
        if title.trim().is_empty() {
            return Err(AppError::TitleRequired);
        }

        self.check_required(stage_id, &values)?;
        self.check_values(stage_id, &values)?;

        for field in self.effective_fields(stage_id)? {
            values
                .entry(field.name.clone())
                .or_insert_with(|| field.initial_value());
        }

        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            fields: values,
            stage_id,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        };
        let id = card.id;

        let pos = self.stage_position(stage_id)?;
        self.stages[pos].cards.push(card);

        self.recount_cards();
        self.touch();
        Ok(id)
    }

    /// Atualização parcial: sobrescreve valor por chave (merge raso) e, se
    /// enviado, o título. Não gera entrada de histórico — o histórico só
    /// cresce em transições de stage.
    pub fn update_card(
        &mut self,
        card_id: Uuid,
        title: Option<&str>,
        values: Option<FieldValues>,
    ) -> Result<(), AppError> {
        let stage_id = self.card(card_id)?.stage_id;

        if let Some(title) = title {
            if title.trim().is_empty() {
                return Err(AppError::TitleRequired);
            }
        }
        if let Some(values) = &values {
            self.check_values(stage_id, values)?;
        }

        let pos = self.stage_position(stage_id)?;
        let card = self.stages[pos]
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or(AppError::CardNotFound)?;

        if let Some(title) = title {
            card.title = title.trim().to_string();
        }
        if let Some(values) = values {
            for (nome, valor) in values {
                card.fields.insert(nome, valor);
            }
        }
        card.updated_at = Utc::now();

        self.touch();
        Ok(())
    }

    pub fn delete_card(&mut self, card_id: Uuid) -> Result<(), AppError> {
        let stage_id = self.card(card_id)?.stage_id;
        let pos = self.stage_position(stage_id)?;
        self.stages[pos].cards.retain(|c| c.id != card_id);

        self.recount_cards();
        self.touch();
        Ok(())
    }

    // --- TRANSIÇÃO ---

    /// Move um card entre stages: valida a política de movimentos e os
    /// campos obrigatórios do destino, e só então remove da origem,
    /// registra o snapshot no histórico e anexa ao fim do destino.
    /// Ou tudo acontece, ou nada acontece.
    pub fn move_card(
        &mut self,
        card_id: Uuid,
        from_stage_id: Uuid,
        to_stage_id: Uuid,
    ) -> Result<(), AppError> {
        // 1. Resolve origem, destino e card.
        let from_pos = self.stage_position(from_stage_id)?;
        let to_pos = self.stage_position(to_stage_id)?;
        let card_idx = self.stages[from_pos]
            .cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(AppError::CardNotFound)?;

        // Reordenação dentro do mesmo stage não é uma transição.
        if from_stage_id == to_stage_id {
            return Ok(());
        }

        // 2. Política de movimentos da origem: None libera qualquer destino,
        //    lista presente exige que o destino esteja nela.
        if let Some(permitidos) = &self.stages[from_pos].allowed_moves {
            if !permitidos.contains(&to_stage_id) {
                return Err(AppError::TransitionNotAllowed {
                    from: self.stages[from_pos].name.clone(),
                    to: self.stages[to_pos].name.clone(),
                });
            }
        }

        // 3. Obrigatórios do destino contra os valores atuais do card.
        let values = self.stages[from_pos].cards[card_idx].fields.clone();
        self.check_required(to_stage_id, &values)?;

        // 4. Remove da origem, registra o histórico e anexa ao destino.
        let now = Utc::now();
        let mut card = self.stages[from_pos].cards.remove(card_idx);
        card.history.push(CardHistory {
            date: now,
            from: StageRef {
                stage_id: from_stage_id,
                stage_name: self.stages[from_pos].name.clone(),
            },
            to: StageRef {
                stage_id: to_stage_id,
                stage_name: self.stages[to_pos].name.clone(),
            },
            fields: card.fields.clone(),
        });
        card.stage_id = to_stage_id;
        card.updated_at = now;
        self.stages[to_pos].cards.push(card);

        // 5. Contadores derivados e timestamp do flow.
        self.recount_cards();
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::FieldType;

    fn campo(nome: &str, tipo: FieldType, required: bool) -> Field {
        Field {
            id: Uuid::new_v4(),
            name: nome.to_string(),
            field_type: tipo,
            required,
            options: None,
            default_value: None,
            validation: None,
            visibility: None,
            depends_on: None,
            order: 0,
            source_stage: None,
            read_only: false,
        }
    }

    fn soma_dos_stages(flow: &Flow) -> u32 {
        flow.stages.iter().map(|s| s.cards.len() as u32).sum()
    }

    /// Flow dos cenários: "Backlog" (order 0, campo obrigatório "Owner")
    /// e "Done" (order 1).
    fn flow_backlog_done() -> (Flow, Uuid, Uuid) {
        let mut flow = Flow::new("Entregas", None);
        let backlog = flow.add_stage("Backlog").unwrap();
        let done = flow.add_stage("Done").unwrap();
        flow.add_stage_field(backlog, campo("Owner", FieldType::Text, true))
            .unwrap();
        (flow, backlog, done)
    }

    fn valores(pares: &[(&str, FieldValue)]) -> FieldValues {
        pares
            .iter()
            .map(|(nome, valor)| (nome.to_string(), valor.clone()))
            .collect()
    }

    #[test]
    fn criar_e_mover_card_registra_historico() {
        let (mut flow, backlog, done) = flow_backlog_done();

        let card_id = flow
            .create_card(
                backlog,
                "Entregar release",
                valores(&[("Owner", FieldValue::Text("Alice".into()))]),
            )
            .unwrap();

        flow.move_card(card_id, backlog, done).unwrap();

        let card = flow.card(card_id).unwrap();
        assert_eq!(card.history.len(), 1);
        assert_eq!(card.history[0].from.stage_name, "Backlog");
        assert_eq!(card.history[0].to.stage_name, "Done");
        assert_eq!(card.stage_id, done);
        assert_eq!(
            card.history[0].fields.get("Owner"),
            Some(&FieldValue::Text("Alice".into()))
        );
    }

    #[test]
    fn card_novo_comeca_sem_historico() {
        let (mut flow, backlog, _) = flow_backlog_done();
        let card_id = flow
            .create_card(
                backlog,
                "Sem passado",
                valores(&[("Owner", FieldValue::Text("Bia".into()))]),
            )
            .unwrap();
        assert!(flow.card(card_id).unwrap().history.is_empty());
    }

    #[test]
    fn criar_card_sem_obrigatorio_falha_e_nao_aparece() {
        let (mut flow, backlog, _) = flow_backlog_done();

        let erro = flow.create_card(backlog, "Sem dono", FieldValues::new());
        match erro {
            Err(AppError::MissingRequiredFields(nomes)) => {
                assert_eq!(nomes, vec!["Owner".to_string()])
            }
            outro => panic!("esperado MissingRequiredFields, veio {outro:?}"),
        }

        // O card não pode ter sido parcialmente aplicado em stage nenhum.
        assert_eq!(flow.cards, 0);
        assert!(flow.stages.iter().all(|s| s.cards.is_empty()));
    }

    #[test]
    fn titulo_vazio_falha() {
        let (mut flow, backlog, _) = flow_backlog_done();
        assert!(matches!(
            flow.create_card(backlog, "   ", FieldValues::new()),
            Err(AppError::TitleRequired)
        ));
    }

    #[test]
    fn movimento_fora_da_lista_permitida_falha_sem_efeito() {
        let (mut flow, backlog, done) = flow_backlog_done();
        let archived = flow.add_stage("Archived").unwrap();

        flow.update_stage(
            backlog,
            StageUpdate {
                allowed_moves: Some(vec![done]),
                ..Default::default()
            },
        )
        .unwrap();

        let card_id = flow
            .create_card(
                backlog,
                "Preso no funil",
                valores(&[("Owner", FieldValue::Text("Caio".into()))]),
            )
            .unwrap();

        let erro = flow.move_card(card_id, backlog, archived);
        assert!(matches!(erro, Err(AppError::TransitionNotAllowed { .. })));

        // O card continua na origem, sem histórico novo.
        let card = flow.card(card_id).unwrap();
        assert_eq!(card.stage_id, backlog);
        assert!(card.history.is_empty());
        assert_eq!(flow.stage(backlog).unwrap().cards.len(), 1);
    }

    #[test]
    fn lista_permitida_vazia_bloqueia_tudo() {
        let (mut flow, backlog, done) = flow_backlog_done();
        flow.update_stage(
            backlog,
            StageUpdate {
                allowed_moves: Some(vec![]),
                ..Default::default()
            },
        )
        .unwrap();

        let card_id = flow
            .create_card(
                backlog,
                "Sem saída",
                valores(&[("Owner", FieldValue::Text("Dani".into()))]),
            )
            .unwrap();

        assert!(matches!(
            flow.move_card(card_id, backlog, done),
            Err(AppError::TransitionNotAllowed { .. })
        ));
    }

    #[test]
    fn heranca_marca_origem_e_somente_leitura() {
        let mut flow = Flow::new("Com herança", None);
        let backlog = flow.add_stage("Backlog").unwrap();
        let review = flow.add_stage("Review").unwrap();

        flow.add_stage_field(backlog, campo("Priority", FieldType::Text, false))
            .unwrap();
        flow.update_stage(
            review,
            StageUpdate {
                field_config: Some(FieldConfig {
                    inherit_fields: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        let efetivos = flow.effective_fields(review).unwrap();
        let herdado = efetivos
            .iter()
            .find(|f| f.name == "Priority")
            .expect("campo herdado ausente");
        assert!(herdado.read_only);
        assert_eq!(herdado.source_stage, Some(backlog));

        // Sem herança ligada, o campo do stage anterior não aparece.
        let backlog_efetivos = flow.effective_fields(backlog).unwrap();
        assert!(backlog_efetivos.iter().all(|f| f.source_stage.is_none()));
    }

    #[test]
    fn conjunto_efetivo_ordena_proprios_antes_dos_herdados() {
        let mut flow = Flow::new("Ordenação", None);
        let a = flow.add_stage("A").unwrap();
        let b = flow.add_stage("B").unwrap();
        let c = flow.add_stage("C").unwrap();

        flow.add_stage_field(a, campo("De A", FieldType::Text, false))
            .unwrap();
        flow.add_stage_field(b, campo("De B", FieldType::Text, false))
            .unwrap();
        flow.add_stage_field(c, campo("Próprio", FieldType::Text, false))
            .unwrap();
        flow.update_stage(
            c,
            StageUpdate {
                field_config: Some(FieldConfig {
                    inherit_fields: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        let nomes: Vec<String> = flow
            .effective_fields(c)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        // Próprios primeiro, depois herdados agrupados por stage de origem
        // em ordem crescente.
        assert_eq!(nomes, vec!["Próprio", "De A", "De B"]);
    }

    #[test]
    fn conjunto_efetivo_e_puro() {
        let mut flow = Flow::new("Leitura idempotente", None);
        let a = flow.add_stage("A").unwrap();
        let b = flow.add_stage("B").unwrap();
        flow.add_stage_field(a, campo("X", FieldType::Text, false))
            .unwrap();
        flow.update_stage(
            b,
            StageUpdate {
                field_config: Some(FieldConfig {
                    inherit_fields: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        let antes = flow.clone();
        let primeira = flow.effective_fields(b).unwrap();
        let segunda = flow.effective_fields(b).unwrap();
        assert_eq!(primeira, segunda);
        // Computar a visão derivada não pode mutar o agregado.
        assert_eq!(flow, antes);
    }

    #[test]
    fn contador_de_cards_acompanha_toda_mutacao() {
        let (mut flow, backlog, done) = flow_backlog_done();
        let dono = valores(&[("Owner", FieldValue::Text("Eva".into()))]);

        let c1 = flow.create_card(backlog, "Um", dono.clone()).unwrap();
        let c2 = flow.create_card(backlog, "Dois", dono.clone()).unwrap();
        assert_eq!(flow.cards, 2);
        assert_eq!(flow.cards, soma_dos_stages(&flow));

        flow.move_card(c1, backlog, done).unwrap();
        assert_eq!(flow.cards, soma_dos_stages(&flow));

        flow.delete_card(c2).unwrap();
        assert_eq!(flow.cards, 1);
        assert_eq!(flow.cards, soma_dos_stages(&flow));
    }

    #[test]
    fn card_pertence_a_exatamente_um_stage() {
        let (mut flow, backlog, done) = flow_backlog_done();
        let card_id = flow
            .create_card(
                backlog,
                "Único",
                valores(&[("Owner", FieldValue::Text("Gil".into()))]),
            )
            .unwrap();

        flow.move_card(card_id, backlog, done).unwrap();

        let donos: usize = flow
            .stages
            .iter()
            .filter(|s| s.cards.iter().any(|c| c.id == card_id))
            .count();
        assert_eq!(donos, 1);
    }

    #[test]
    fn historico_so_cresce_e_preserva_entradas() {
        let (mut flow, backlog, done) = flow_backlog_done();
        let review = flow.add_stage("Review").unwrap();

        let card_id = flow
            .create_card(
                backlog,
                "Vai e volta",
                valores(&[("Owner", FieldValue::Text("Hugo".into()))]),
            )
            .unwrap();

        flow.move_card(card_id, backlog, review).unwrap();
        let primeira = flow.card(card_id).unwrap().history[0].clone();

        flow.move_card(card_id, review, done).unwrap();
        flow.move_card(card_id, done, backlog).unwrap();

        let card = flow.card(card_id).unwrap();
        assert_eq!(card.history.len(), 3);
        // A entrada antiga não muda com movimentos posteriores.
        assert_eq!(card.history[0], primeira);
        assert_eq!(card.history[1].from.stage_name, "Review");
        assert_eq!(card.history[2].to.stage_name, "Backlog");
    }

    #[test]
    fn atualizar_card_nao_gera_historico() {
        let (mut flow, backlog, _) = flow_backlog_done();
        let card_id = flow
            .create_card(
                backlog,
                "Editável",
                valores(&[("Owner", FieldValue::Text("Iris".into()))]),
            )
            .unwrap();

        flow.update_card(
            card_id,
            Some("Editado"),
            Some(valores(&[("Owner", FieldValue::Text("Ivo".into()))])),
        )
        .unwrap();

        let card = flow.card(card_id).unwrap();
        assert_eq!(card.title, "Editado");
        assert_eq!(card.fields.get("Owner"), Some(&FieldValue::Text("Ivo".into())));
        assert!(card.history.is_empty());
    }

    #[test]
    fn campos_nao_enviados_recebem_valor_padrao() {
        let mut flow = Flow::new("Defaults", None);
        let stage = flow.add_stage("Entrada").unwrap();
        let mut progresso = campo("Checklist", FieldType::Progress, false);
        progresso.options = Some(vec!["revisar".into(), "aprovar".into()]);
        flow.add_stage_field(stage, progresso).unwrap();
        flow.add_field(campo("Nota", FieldType::Text, false)).unwrap();

        let card_id = flow.create_card(stage, "Completo", FieldValues::new()).unwrap();

        let card = flow.card(card_id).unwrap();
        assert_eq!(
            card.fields.get("Checklist"),
            Some(&FieldValue::BoolList(vec![false, false]))
        );
        // Campo de nível de flow também é aplicável.
        assert_eq!(card.fields.get("Nota"), Some(&FieldValue::Text(String::new())));
    }

    #[test]
    fn required_fields_da_configuracao_tambem_bloqueia() {
        let mut flow = Flow::new("Config obrigatória", None);
        let stage = flow.add_stage("Triagem").unwrap();
        flow.add_stage_field(stage, campo("Contexto", FieldType::Text, false))
            .unwrap();
        flow.update_stage(
            stage,
            StageUpdate {
                field_config: Some(FieldConfig {
                    required_fields: vec!["Contexto".into()],
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(matches!(
            flow.create_card(stage, "Sem contexto", FieldValues::new()),
            Err(AppError::MissingRequiredFields(_))
        ));
    }

    #[test]
    fn excluir_stage_cascade_remove_os_cards() {
        let (mut flow, backlog, done) = flow_backlog_done();
        let dono = valores(&[("Owner", FieldValue::Text("Juno".into()))]);
        for titulo in ["a", "b", "c"] {
            flow.create_card(backlog, titulo, dono.clone()).unwrap();
        }
        assert_eq!(flow.cards, 3);

        flow.remove_stage(backlog, StageDeletePolicy::Cascade).unwrap();

        assert_eq!(flow.cards, 0);
        assert_eq!(flow.cards, soma_dos_stages(&flow));
        assert!(flow.stage(done).unwrap().cards.is_empty());
    }

    #[test]
    fn excluir_stage_reject_recusa_com_cards() {
        let (mut flow, backlog, _) = flow_backlog_done();
        flow.create_card(
            backlog,
            "Ocupado",
            valores(&[("Owner", FieldValue::Text("Kai".into()))]),
        )
        .unwrap();

        assert!(matches!(
            flow.remove_stage(backlog, StageDeletePolicy::Reject),
            Err(AppError::StageNotEmpty)
        ));
        assert_eq!(flow.stages.len(), 2);

        flow.delete_card(flow.stage(backlog).unwrap().cards[0].id)
            .unwrap();
        assert!(flow.remove_stage(backlog, StageDeletePolicy::Reject).is_ok());
    }

    #[test]
    fn excluir_stage_migrate_leva_cards_para_o_adjacente() {
        let mut flow = Flow::new("Migração", None);
        let primeiro = flow.add_stage("Primeiro").unwrap();
        let segundo = flow.add_stage("Segundo").unwrap();
        let terceiro = flow.add_stage("Terceiro").unwrap();

        let c1 = flow.create_card(segundo, "Um", FieldValues::new()).unwrap();
        let c2 = flow.create_card(segundo, "Dois", FieldValues::new()).unwrap();
        flow.create_card(terceiro, "Fica", FieldValues::new()).unwrap();

        // O destino da migração é o stage anterior na ordem.
        flow.remove_stage(segundo, StageDeletePolicy::Migrate).unwrap();

        assert_eq!(flow.cards, 3);
        assert_eq!(flow.cards, soma_dos_stages(&flow));
        let destino = flow.stage(primeiro).unwrap();
        assert_eq!(destino.cards.len(), 2);
        for id in [c1, c2] {
            let card = flow.card(id).unwrap();
            assert_eq!(card.stage_id, primeiro);
            // A migração é uma transição: fica registrada no histórico.
            assert_eq!(card.history.len(), 1);
            assert_eq!(card.history[0].from.stage_name, "Segundo");
            assert_eq!(card.history[0].to.stage_name, "Primeiro");
        }
    }

    #[test]
    fn excluir_primeiro_stage_migrate_usa_o_proximo() {
        let mut flow = Flow::new("Migração para frente", None);
        let primeiro = flow.add_stage("Primeiro").unwrap();
        let segundo = flow.add_stage("Segundo").unwrap();

        flow.create_card(primeiro, "Vai pra frente", FieldValues::new())
            .unwrap();
        flow.remove_stage(primeiro, StageDeletePolicy::Migrate).unwrap();

        assert_eq!(flow.stage(segundo).unwrap().cards.len(), 1);
        assert_eq!(flow.cards, 1);
    }

    #[test]
    fn mover_para_o_mesmo_stage_e_no_op() {
        let (mut flow, backlog, _) = flow_backlog_done();
        let card_id = flow
            .create_card(
                backlog,
                "Parado",
                valores(&[("Owner", FieldValue::Text("Lia".into()))]),
            )
            .unwrap();

        flow.move_card(card_id, backlog, backlog).unwrap();
        assert!(flow.card(card_id).unwrap().history.is_empty());
    }

    #[test]
    fn mover_exige_obrigatorios_do_destino() {
        let mut flow = Flow::new("Destino exigente", None);
        let triagem = flow.add_stage("Triagem").unwrap();
        let execucao = flow.add_stage("Execução").unwrap();
        flow.add_stage_field(execucao, campo("Estimativa", FieldType::Number, true))
            .unwrap();

        let card_id = flow.create_card(triagem, "Sem estimativa", FieldValues::new()).unwrap();

        match flow.move_card(card_id, triagem, execucao) {
            Err(AppError::MissingRequiredFields(nomes)) => {
                assert_eq!(nomes, vec!["Estimativa".to_string()])
            }
            outro => panic!("esperado MissingRequiredFields, veio {outro:?}"),
        }
        // Rejeitado por inteiro: o card segue na origem.
        assert_eq!(flow.card(card_id).unwrap().stage_id, triagem);

        flow.update_card(
            card_id,
            None,
            Some(valores(&[("Estimativa", FieldValue::Number(3.0))])),
        )
        .unwrap();
        assert!(flow.move_card(card_id, triagem, execucao).is_ok());
    }

    #[test]
    fn stages_saem_em_ordem_de_exibicao() {
        let mut flow = Flow::new("Ordenado", None);
        let a = flow.add_stage("A").unwrap();
        flow.add_stage("B").unwrap();
        // Empurra A para o fim: a listagem segue `order`, não a criação.
        flow.update_stage(
            a,
            StageUpdate {
                order: Some(5),
                ..Default::default()
            },
        )
        .unwrap();

        let nomes: Vec<String> = flow.ordered_stages().into_iter().map(|s| s.name).collect();
        assert_eq!(nomes, vec!["B", "A"]);
    }

    #[test]
    fn empate_de_order_cai_na_posicao_do_array() {
        let mut flow = Flow::new("Empate", None);
        let a = flow.add_stage("A").unwrap();
        let b = flow.add_stage("B").unwrap();
        // Força empate de order entre A e B.
        flow.update_stage(
            b,
            StageUpdate {
                order: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        flow.add_stage_field(a, campo("De A", FieldType::Text, false))
            .unwrap();
        flow.update_stage(
            b,
            StageUpdate {
                field_config: Some(FieldConfig {
                    inherit_fields: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        // A vem antes de B no array, então B herda de A mesmo com empate.
        let efetivos = flow.effective_fields(b).unwrap();
        assert!(efetivos.iter().any(|f| f.source_stage == Some(a)));
        // E A não herda de B.
        let efetivos_a = flow.effective_fields(a).unwrap();
        assert!(efetivos_a.iter().all(|f| f.source_stage.is_none()));
    }
}
