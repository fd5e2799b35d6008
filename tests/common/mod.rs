// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use kube::{client::Client, Config};
use machine_e2e::context::Context;
use machine_e2e::crd::MachineDeployment;
use machine_e2e::poll::PollSettings;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const API_PREFIX: &str = "/apis/cluster.k8s.io/v1alpha1/namespaces/";
const NODES_PREFIX: &str = "/api/v1/nodes/";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Poll settings small enough for in-process tests
pub fn fast_poll(timeout: Duration) -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
        timeout,
    }
}

/// Build a scenario context talking to a mock API server
pub fn context_for(server: &MockServer, poll: PollSettings) -> Context {
    let mut config = Config::new(server.uri().parse().expect("mock server uri"));
    config.default_namespace = "kube-system".to_string();
    let client = Client::try_from(config).expect("client for mock server");
    Context::new(client, poll)
}

/// A single-replica deployment as a manifest would produce it
pub fn machine_deployment(name: &str) -> MachineDeployment {
    serde_json::from_value(json!({
        "apiVersion": "cluster.k8s.io/v1alpha1",
        "kind": "MachineDeployment",
        "metadata": { "name": name, "namespace": "kube-system" },
        "spec": {
            "replicas": 1,
            "selector": { "matchLabels": { "name": name } },
            "template": {
                "metadata": { "labels": { "name": name } },
                "spec": {
                    "providerSpec": { "value": { "cloudProvider": "fake" } },
                    "versions": { "kubelet": "1.31.0" }
                }
            }
        }
    }))
    .expect("valid MachineDeployment")
}

/// Observable state of the fake control plane
#[derive(Default)]
pub struct State {
    pub deployments: BTreeMap<String, Value>,
    pub machine_sets: BTreeMap<String, Value>,
    pub machines: BTreeMap<String, Value>,
    pub nodes: BTreeMap<String, Value>,
    /// Names of every MachineSet ever created, in creation order
    pub machine_set_history: Vec<String>,
    /// Machines marked for deletion, with the requests left until they are gone
    pub terminating: BTreeMap<String, u32>,
    next_id: u32,
}

/// How machines go away once their deployment is deleted
#[derive(Clone, Copy, Debug, Default)]
pub enum MachineTeardown {
    /// Machines and nodes are removed together with their sets
    #[default]
    Immediate,
    /// Sets are removed at once; machines stay marked for deletion for this
    /// many further requests
    AfterRequests(u32),
    /// Sets are removed at once; machines are stuck in deletion
    Never,
}

/// In-process stand-in for the API server plus a machine controller.
///
/// Every request first advances the controller by at most one step, so the
/// intermediate states of a rollout are observable by polls:
/// create a set for the current template, converge a set's machines, scale
/// old sets down once the new set is ready, then match the deployment's
/// replica count. Deleting a deployment removes its sets right away; its
/// machines follow according to [`MachineTeardown`].
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    state: Arc<Mutex<State>>,
    /// Nodes of machines from the second generation onwards never become ready
    stall_rollout: bool,
    machine_teardown: MachineTeardown,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stalled_rollout() -> Self {
        Self {
            stall_rollout: true,
            ..Self::default()
        }
    }

    pub fn with_machine_teardown(machine_teardown: MachineTeardown) -> Self {
        Self {
            machine_teardown,
            ..Self::default()
        }
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("state lock")
    }

    /// Serve this control plane on a fresh mock server
    pub async fn start(&self) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(self.clone())
            .mount(&server)
            .await;
        server
    }

    fn handle(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state();
        self.finish_teardown(&mut state);
        self.reconcile(&mut state);

        let method = request.method.as_str();
        let path = request.url.path();

        if let Some(name) = path.strip_prefix(NODES_PREFIX) {
            return match (method, state.nodes.get(name)) {
                ("GET", Some(node)) => ok(node),
                _ => not_found(name),
            };
        }

        let Some(rest) = path.strip_prefix(API_PREFIX) else {
            return not_found(path);
        };
        let segments: Vec<&str> = rest.split('/').collect();

        match (method, segments.as_slice()) {
            ("POST", [ns, "machinedeployments"]) => create_deployment(&mut state, ns, &request.body),
            ("GET", [_, "machinedeployments", name]) => get(&state.deployments, name),
            ("PUT", [_, "machinedeployments", name]) => {
                replace_deployment(&mut state, name, &request.body)
            }
            ("DELETE", [_, "machinedeployments", name]) => {
                delete_deployment(&mut state, name, self.machine_teardown)
            }
            ("GET", [_, "machinesets"]) => list("MachineSetList", &state.machine_sets),
            ("GET", [_, "machinesets", name]) => get(&state.machine_sets, name),
            ("GET", [_, "machines"]) => list("MachineList", &state.machines),
            ("GET", [_, "machines", name]) => get(&state.machines, name),
            _ => not_found(path),
        }
    }

    /// Count down machines marked for deletion and remove the expired ones.
    fn finish_teardown(&self, state: &mut State) {
        if matches!(self.machine_teardown, MachineTeardown::Never) {
            return;
        }

        let mut expired = Vec::new();
        for (name, remaining) in &mut state.terminating {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                expired.push(name.clone());
            }
        }
        for name in expired {
            state.terminating.remove(&name);
            remove_machine(state, &name);
        }
    }

    /// Advance the controller by at most one step.
    fn reconcile(&self, state: &mut State) {
        let deployments: Vec<Value> = state.deployments.values().cloned().collect();

        for md in deployments {
            let md_uid = md["metadata"]["uid"].as_str().unwrap_or_default().to_string();
            let desired = md["spec"]["replicas"].as_i64().unwrap_or(1);
            let template = &md["spec"]["template"];

            let owned: Vec<String> = state
                .machine_sets
                .values()
                .filter(|ms| owner_uid(ms) == md_uid)
                .filter_map(|ms| ms["metadata"]["name"].as_str().map(ToString::to_string))
                .collect();
            let current = owned
                .iter()
                .find(|name| state.machine_sets[*name]["spec"]["template"] == *template)
                .cloned();

            let Some(current) = current else {
                create_machine_set(state, &md, desired);
                return;
            };

            for set_name in &owned {
                if self.converge_machines(state, set_name) {
                    return;
                }
            }

            let old_sets: Vec<&String> = owned.iter().filter(|n| **n != current).collect();
            let scaled_old = old_sets
                .iter()
                .any(|n| state.machine_sets[*n]["spec"]["replicas"].as_i64() != Some(0));
            if scaled_old && set_is_ready(state, &current) {
                for name in old_sets {
                    if let Some(ms) = state.machine_sets.get_mut(name) {
                        ms["spec"]["replicas"] = json!(0);
                    }
                }
                return;
            }

            if let Some(ms) = state.machine_sets.get_mut(&current) {
                if ms["spec"]["replicas"].as_i64() != Some(desired) {
                    ms["spec"]["replicas"] = json!(desired);
                    return;
                }
            }
        }
    }

    /// Add or remove one machine of a set; returns whether anything changed.
    fn converge_machines(&self, state: &mut State, set_name: &str) -> bool {
        let ms = state.machine_sets[set_name].clone();
        let ms_uid = ms["metadata"]["uid"].as_str().unwrap_or_default().to_string();
        let desired = usize::try_from(ms["spec"]["replicas"].as_i64().unwrap_or(1)).unwrap_or(0);
        let machines: Vec<String> = state
            .machines
            .values()
            .filter(|m| owner_uid(m) == ms_uid)
            .filter_map(|m| m["metadata"]["name"].as_str().map(ToString::to_string))
            .collect();

        if machines.len() < desired {
            let generation = state
                .machine_set_history
                .iter()
                .position(|n| n == set_name)
                .unwrap_or(0);
            let ready = !(self.stall_rollout && generation > 0);
            create_machine(state, &ms, ready);
            return true;
        }

        if machines.len() > desired {
            remove_machine(state, &machines[0]);
            return true;
        }

        false
    }
}

impl Respond for FakeControlPlane {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.handle(request)
    }
}

fn next_id(state: &mut State) -> u32 {
    state.next_id += 1;
    state.next_id
}

fn timestamp(id: u32) -> String {
    format!("2024-01-01T00:{:02}:{:02}Z", (id / 60) % 60, id % 60)
}

fn owner_uid(obj: &Value) -> &str {
    obj["metadata"]["ownerReferences"][0]["uid"]
        .as_str()
        .unwrap_or_default()
}

fn owner_reference(kind: &str, owner: &Value) -> Value {
    json!([{
        "apiVersion": "cluster.k8s.io/v1alpha1",
        "kind": kind,
        "name": owner["metadata"]["name"],
        "uid": owner["metadata"]["uid"],
        "controller": true,
        "blockOwnerDeletion": true
    }])
}

fn create_machine_set(state: &mut State, md: &Value, replicas: i64) {
    let id = next_id(state);
    let name = format!("{}-{id}", md["metadata"]["name"].as_str().unwrap_or("md"));
    let ms = json!({
        "apiVersion": "cluster.k8s.io/v1alpha1",
        "kind": "MachineSet",
        "metadata": {
            "name": name,
            "namespace": md["metadata"]["namespace"],
            "uid": format!("uid-{name}"),
            "creationTimestamp": timestamp(id),
            "labels": md["spec"]["template"]["metadata"]["labels"],
            "ownerReferences": owner_reference("MachineDeployment", md)
        },
        "spec": {
            "replicas": replicas,
            "selector": md["spec"]["selector"],
            "template": md["spec"]["template"]
        },
        "status": { "replicas": 0 }
    });
    state.machine_sets.insert(name.clone(), ms);
    state.machine_set_history.push(name);
}

fn create_machine(state: &mut State, ms: &Value, ready: bool) {
    let id = next_id(state);
    let name = format!("{}-{id}", ms["metadata"]["name"].as_str().unwrap_or("ms"));
    let node_name = format!("node-{id}");

    let machine = json!({
        "apiVersion": "cluster.k8s.io/v1alpha1",
        "kind": "Machine",
        "metadata": {
            "name": name,
            "namespace": ms["metadata"]["namespace"],
            "uid": format!("uid-{name}"),
            "creationTimestamp": timestamp(id),
            "labels": ms["spec"]["template"]["metadata"]["labels"],
            "ownerReferences": owner_reference("MachineSet", ms)
        },
        "spec": ms["spec"]["template"]["spec"],
        "status": { "nodeRef": { "kind": "Node", "name": node_name } }
    });
    let node = json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": { "name": node_name },
        "status": {
            "conditions": [{ "type": "Ready", "status": if ready { "True" } else { "False" } }]
        }
    });

    state.machines.insert(name, machine);
    state.nodes.insert(node_name, node);
}

fn remove_machine(state: &mut State, name: &str) {
    if let Some(machine) = state.machines.remove(name) {
        if let Some(node) = machine["status"]["nodeRef"]["name"].as_str() {
            state.nodes.remove(node);
        }
    }
}

fn set_is_ready(state: &State, set_name: &str) -> bool {
    let ms = &state.machine_sets[set_name];
    let ms_uid = ms["metadata"]["uid"].as_str().unwrap_or_default();
    let desired = usize::try_from(ms["spec"]["replicas"].as_i64().unwrap_or(1)).unwrap_or(0);
    let machines: Vec<&Value> = state
        .machines
        .values()
        .filter(|m| owner_uid(m) == ms_uid)
        .collect();

    machines.len() == desired
        && machines.iter().all(|m| {
            m["status"]["nodeRef"]["name"]
                .as_str()
                .and_then(|n| state.nodes.get(n))
                .is_some_and(|node| node["status"]["conditions"][0]["status"] == "True")
        })
}

fn create_deployment(state: &mut State, namespace: &str, body: &[u8]) -> ResponseTemplate {
    let Ok(mut md) = serde_json::from_slice::<Value>(body) else {
        return status(400, "BadRequest", "malformed body");
    };
    let name = md["metadata"]["name"].as_str().unwrap_or_default().to_string();
    if state.deployments.contains_key(&name) {
        return status(409, "AlreadyExists", &name);
    }

    let id = next_id(state);
    md["metadata"]["namespace"] = json!(namespace);
    md["metadata"]["uid"] = json!(format!("uid-md-{id}"));
    md["metadata"]["resourceVersion"] = json!(id.to_string());
    md["metadata"]["creationTimestamp"] = json!(timestamp(id));

    state.deployments.insert(name, md.clone());
    ResponseTemplate::new(201).set_body_json(md)
}

fn replace_deployment(state: &mut State, name: &str, body: &[u8]) -> ResponseTemplate {
    let Some(existing) = state.deployments.get(name).cloned() else {
        return not_found(name);
    };
    let Ok(mut md) = serde_json::from_slice::<Value>(body) else {
        return status(400, "BadRequest", "malformed body");
    };
    if md["metadata"]["resourceVersion"] != existing["metadata"]["resourceVersion"] {
        return status(409, "Conflict", name);
    }

    let id = next_id(state);
    md["metadata"]["uid"] = existing["metadata"]["uid"].clone();
    md["metadata"]["creationTimestamp"] = existing["metadata"]["creationTimestamp"].clone();
    md["metadata"]["resourceVersion"] = json!(id.to_string());

    state.deployments.insert(name.to_string(), md.clone());
    ok(&md)
}

fn delete_deployment(state: &mut State, name: &str, teardown: MachineTeardown) -> ResponseTemplate {
    let Some(md) = state.deployments.remove(name) else {
        return not_found(name);
    };
    let md_uid = md["metadata"]["uid"].as_str().unwrap_or_default().to_string();

    let set_uids: Vec<String> = state
        .machine_sets
        .values()
        .filter(|ms| owner_uid(ms) == md_uid)
        .filter_map(|ms| ms["metadata"]["uid"].as_str().map(ToString::to_string))
        .collect();
    state.machine_sets.retain(|_, ms| owner_uid(ms) != md_uid);

    let orphans: Vec<String> = state
        .machines
        .values()
        .filter(|m| set_uids.iter().any(|uid| uid == owner_uid(m)))
        .filter_map(|m| m["metadata"]["name"].as_str().map(ToString::to_string))
        .collect();

    for machine in orphans {
        match teardown {
            MachineTeardown::Immediate => remove_machine(state, &machine),
            MachineTeardown::AfterRequests(requests) => mark_terminating(state, machine, requests),
            MachineTeardown::Never => mark_terminating(state, machine, u32::MAX),
        }
    }

    ok(&md)
}

fn mark_terminating(state: &mut State, machine: String, requests: u32) {
    let id = next_id(state);
    if let Some(m) = state.machines.get_mut(&machine) {
        m["metadata"]["deletionTimestamp"] = json!(timestamp(id));
    }
    state.terminating.insert(machine, requests.max(1));
}

fn get(store: &BTreeMap<String, Value>, name: &str) -> ResponseTemplate {
    store.get(name).map_or_else(|| not_found(name), ok)
}

fn list(kind: &str, store: &BTreeMap<String, Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "apiVersion": "cluster.k8s.io/v1alpha1",
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": store.values().collect::<Vec<_>>()
    }))
}

fn ok(body: &Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn not_found(name: &str) -> ResponseTemplate {
    status(404, "NotFound", &format!("{name} not found"))
}

fn status(code: u16, reason: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    }))
}
