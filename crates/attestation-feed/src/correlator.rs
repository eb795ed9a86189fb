// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use crate::events::{Attestation, CorrelatedRecord, DataEvent, RecordKey, RiskEvent};

/// Join data and risk events on `(trader_id, epoch)`.
///
/// Yields one record per data-side key, in the order keys are first seen in `data`. Risk events
/// whose key has no data event are dropped.
pub fn correlate(data: &[DataEvent], risk: &[RiskEvent]) -> Vec<CorrelatedRecord> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut data_groups: HashMap<RecordKey, Vec<DataEvent>> = HashMap::new();
    for event in data {
        data_groups
            .entry(event.key())
            .or_insert_with(|| {
                order.push(event.key());
                Vec::new()
            })
            .push(event.clone());
    }

    let mut risk_groups: HashMap<RecordKey, Vec<RiskEvent>> = HashMap::new();
    for event in risk {
        if data_groups.contains_key(&event.key()) {
            risk_groups.entry(event.key()).or_default().push(event.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let data_events = data_groups.remove(&key)?;
            let block_number = data_events.iter().map(|e| e.block_number).max().unwrap_or_default();
            Some(CorrelatedRecord {
                trader_id: key.trader_id,
                epoch: key.epoch,
                block_number,
                data_events,
                risk_events: risk_groups.remove(&key).unwrap_or_default(),
            })
        })
        .collect()
}
