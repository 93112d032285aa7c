//! Typed wrappers and handlers for the standard services.
//!
//! Each service resource gets a thin newtype over [`ResourceRoot`] with its
//! domain operations, plus a [`Handler`] claiming the service's dispatch
//! keys. The wrappers implement [`ResourceKind`] so they can be fetched
//! directly or resolved as collection members.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::Client;
use crate::collection::{Collection, ResourceKind};
use crate::error::Error;
use crate::monitor::{Deadline, Recovery};
use crate::registry::Handler;
use crate::resource::ResourceRoot;
use crate::transport::Credential;

macro_rules! resource_kind {
    ($name:ident) => {
        #[async_trait]
        impl ResourceKind for $name {
            fn from_root(root: ResourceRoot) -> Self {
                Self(root)
            }

            fn root(&self) -> &ResourceRoot {
                &self.0
            }
        }
    };
}

// --- Service root -----------------------------------------------------------

/// The entry point of the resource graph.
#[derive(Clone)]
pub struct ServiceRoot(ResourceRoot);
resource_kind!(ServiceRoot);

pub struct ServiceRootHandler;

#[async_trait]
impl Handler for ServiceRootHandler {
    fn name(&self) -> &'static str {
        "ServiceRoot"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["#ServiceRoot..ServiceRoot", "/redfish/v1", "/redfish/v1/"]
    }

    /// Chases the manager collection and pins its first member as the
    /// singleton management controller of this service.
    async fn on_fetched(&self, root: &mut ResourceRoot) -> Result<(), Error> {
        let Ok(managers) = root.link("Managers") else {
            return Ok(());
        };
        let client = root.client().clone();
        let collection = Collection::<Manager>::fetch(&client, &managers).await?;
        match collection.first().await {
            Ok(manager) => {
                info!(manager = %manager.root().identifier().unwrap_or("?"), "pinned singleton manager");
                root.attach_eager("Manager", manager.0);
            }
            Err(Error::NotFound(_)) => debug!("manager collection is empty"),
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

impl ServiceRoot {
    /// Fetches `/redfish/v1` and runs the post-fetch link chase.
    pub async fn fetch(client: &Client) -> Result<Self, Error> {
        Ok(Self(client.service_root().await?))
    }

    /// The singleton management controller pinned at fetch time.
    pub fn manager(&self) -> Option<Manager> {
        self.0.eager("Manager").cloned().map(Manager)
    }

    pub async fn account_service(&self) -> Result<AccountService, Error> {
        AccountService::fetch(self.0.client(), &self.0.link("AccountService")?).await
    }

    pub async fn session_service(&self) -> Result<SessionService, Error> {
        SessionService::fetch(self.0.client(), &self.0.link("SessionService")?).await
    }

    /// The task monitor service; the root links it under `Tasks`.
    pub async fn task_service(&self) -> Result<TaskService, Error> {
        TaskService::fetch(self.0.client(), &self.0.link("Tasks")?).await
    }

    pub async fn job_service(&self) -> Result<JobService, Error> {
        JobService::fetch(self.0.client(), &self.0.link("JobService")?).await
    }

    pub async fn event_service(&self) -> Result<EventService, Error> {
        EventService::fetch(self.0.client(), &self.0.link("EventService")?).await
    }

    pub async fn systems(&self) -> Result<Collection<ComputerSystem>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Systems")?).await
    }

    pub async fn chassis(&self) -> Result<Collection<Chassis>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Chassis")?).await
    }

    pub async fn managers(&self) -> Result<Collection<Manager>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Managers")?).await
    }
}

// --- Account service --------------------------------------------------------

#[derive(Clone)]
pub struct AccountService(ResourceRoot);
resource_kind!(AccountService);

pub struct AccountServiceHandler;

#[async_trait]
impl Handler for AccountServiceHandler {
    fn name(&self) -> &'static str {
        "AccountService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/AccountService",
            "#AccountService..AccountService",
            "#ServiceRoot..ServiceRoot/AccountService",
        ]
    }
}

impl AccountService {
    pub async fn accounts(&self) -> Result<Collection<ManagerAccount>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Accounts")?).await
    }
}

/// One user account of the management service.
#[derive(Clone)]
pub struct ManagerAccount(ResourceRoot);
resource_kind!(ManagerAccount);

impl ManagerAccount {
    pub fn username(&self) -> Option<&str> {
        self.0.value().get("UserName").and_then(Value::as_str)
    }

    pub fn enabled(&self) -> Option<bool> {
        self.0.value().get("Enabled").and_then(Value::as_bool)
    }

    pub async fn set_password(&self, password: &str) -> Result<Value, Error> {
        self.0.patch(json!({ "Password": password })).await
    }
}

// --- Session service --------------------------------------------------------

#[derive(Clone)]
pub struct SessionService(ResourceRoot);
resource_kind!(SessionService);

pub struct SessionServiceHandler;

#[async_trait]
impl Handler for SessionServiceHandler {
    fn name(&self) -> &'static str {
        "SessionService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/SessionService",
            "#SessionService..SessionService",
            "#ServiceRoot..ServiceRoot/SessionService",
        ]
    }
}

impl SessionService {
    pub async fn sessions(&self) -> Result<Collection<ResourceRoot>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Sessions")?).await
    }

    /// Exchanges a basic credential for a session token.
    ///
    /// This is the one place the transport's shared credential is swapped,
    /// and it runs under the client's session lock: no other request on
    /// this client is in flight while the exchange is open. A service that
    /// answers without a token leaves the basic credential installed and
    /// yields `None`.
    pub async fn create_session(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<ResourceRoot>, Error> {
        let client = self.0.client().clone();
        let _guard = client.session_lock().await;

        let sessions = self.0.link("Sessions")?;
        let route = client
            .transport()
            .route_of(&sessions)
            .ok_or_else(|| Error::NotFound(format!("no route for {sessions}")))?;

        client.transport().set_credential(Credential::None);
        let exchange = client
            .post(
                &route.template,
                &route.parameters,
                json!({ "UserName": username, "Password": password }),
            )
            .await;

        let restore = || {
            client.transport().set_credential(Credential::Basic {
                username: username.to_string(),
                password: password.to_string(),
            });
        };

        match exchange {
            Ok(value) => match value.get("X-Auth-Token").and_then(Value::as_str) {
                Some(token) => {
                    client
                        .transport()
                        .set_credential(Credential::SessionToken(token.to_string()));
                    info!("session established");
                    Ok(Some(ResourceRoot::from_value(&client, value)?))
                }
                None => {
                    debug!("no session token in response, keeping basic credential");
                    restore();
                    Ok(None)
                }
            },
            Err(e) => {
                restore();
                Err(e)
            }
        }
    }
}

// --- Task service -----------------------------------------------------------

#[derive(Clone)]
pub struct TaskService(ResourceRoot);
resource_kind!(TaskService);

pub struct TaskServiceHandler;

#[async_trait]
impl Handler for TaskServiceHandler {
    fn name(&self) -> &'static str {
        "TaskService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/TaskService",
            "#TaskService..TaskService",
            "#ServiceRoot..ServiceRoot/Tasks",
        ]
    }
}

/// One asynchronous operation tracked by the task service.
#[derive(Clone)]
pub struct Task(ResourceRoot);
resource_kind!(Task);

impl Task {
    pub fn task_state(&self) -> Option<&str> {
        self.0.value().get("TaskState").and_then(Value::as_str)
    }

    pub fn task_status(&self) -> Option<&str> {
        self.0.value().get("TaskStatus").and_then(Value::as_str)
    }

    pub fn messages(&self) -> Option<&Value> {
        self.0.value().get("Messages")
    }
}

impl TaskService {
    pub async fn tasks(&self) -> Result<Collection<Task>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Tasks")?).await
    }

    /// Polls a single task until it leaves the running-and-healthy state.
    pub async fn wait_for(
        &self,
        task_id: &str,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<Task, Error> {
        let tasks = self.tasks().await?;
        let deadline = Deadline::after(max_wait);
        loop {
            let task = deadline.bound(None, tasks.index(task_id)).await?;
            let running = task.task_state() == Some("Running")
                && task.task_status().map_or(true, |s| s == "OK");
            if !running {
                return Ok(task);
            }
            deadline.sleep(poll_interval).await?;
        }
    }
}

// --- Job service ------------------------------------------------------------

#[derive(Clone)]
pub struct JobService(ResourceRoot);
resource_kind!(JobService);

pub struct JobServiceHandler;

#[async_trait]
impl Handler for JobServiceHandler {
    fn name(&self) -> &'static str {
        "JobService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/JobService",
            "#JobService..JobService",
            "#ServiceRoot..ServiceRoot/JobService",
        ]
    }
}

impl JobService {
    pub async fn jobs(&self) -> Result<Collection<ResourceRoot>, Error> {
        Collection::fetch(self.0.client(), &self.0.link("Jobs")?).await
    }
}

// --- Managed hardware -------------------------------------------------------

#[derive(Clone)]
pub struct Chassis(ResourceRoot);
resource_kind!(Chassis);

pub struct ChassisHandler;

#[async_trait]
impl Handler for ChassisHandler {
    fn name(&self) -> &'static str {
        "Chassis"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["/redfish/v1/Chassis/{ChassisId}", "#Chassis..Chassis"]
    }
}

impl Chassis {
    pub async fn reset(&self, reset_type: &str) -> Result<Value, Error> {
        invoke_reset(&self.0, "#Chassis.Reset", reset_type).await
    }
}

#[derive(Clone)]
pub struct ComputerSystem(ResourceRoot);
resource_kind!(ComputerSystem);

pub struct SystemHandler;

#[async_trait]
impl Handler for SystemHandler {
    fn name(&self) -> &'static str {
        "ComputerSystem"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["/redfish/v1/Systems/{SystemId}", "#ComputerSystem..ComputerSystem"]
    }
}

impl ComputerSystem {
    pub async fn reset(&self, reset_type: &str) -> Result<Value, Error> {
        invoke_reset(&self.0, "#ComputerSystem.Reset", reset_type).await
    }
}

/// The management controller itself.
#[derive(Clone)]
pub struct Manager(pub(crate) ResourceRoot);
resource_kind!(Manager);

pub struct ManagerHandler;

#[async_trait]
impl Handler for ManagerHandler {
    fn name(&self) -> &'static str {
        "Manager"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["#Manager..Manager"]
    }
}

impl Manager {
    pub async fn reset(&self, reset_type: &str) -> Result<Value, Error> {
        invoke_reset(&self.0, "#Manager.Reset", reset_type).await
    }

    /// A power-cycle recovery action for the job monitor.
    pub fn reset_recovery(&self, reset_type: &str) -> ManagerResetRecovery {
        ManagerResetRecovery {
            manager: self.clone(),
            reset_type: reset_type.to_string(),
        }
    }
}

/// Power-cycles the managed target by resetting its manager.
pub struct ManagerResetRecovery {
    manager: Manager,
    reset_type: String,
}

#[async_trait]
impl Recovery for ManagerResetRecovery {
    async fn recover(&self) -> Result<(), Error> {
        info!(reset_type = %self.reset_type, "power-cycling the managed target");
        self.manager.reset(&self.reset_type).await.map(|_| ())
    }
}

async fn invoke_reset(root: &ResourceRoot, action: &str, reset_type: &str) -> Result<Value, Error> {
    let actions = root.actions().ok_or_else(|| {
        Error::NotFound(format!(
            "{} exposes no actions",
            root.identifier().unwrap_or("resource")
        ))
    })?;
    let bound = actions.get(action)?;
    bound.invoke(json!({ "ResetType": reset_type })).await
}

// --- Auxiliary services -----------------------------------------------------

#[derive(Clone)]
pub struct EventService(ResourceRoot);
resource_kind!(EventService);

pub struct EventServiceHandler;

#[async_trait]
impl Handler for EventServiceHandler {
    fn name(&self) -> &'static str {
        "EventService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/EventService",
            "#EventService..EventService",
            "#ServiceRoot..ServiceRoot/EventService",
        ]
    }
}

impl EventService {
    pub async fn submit_test_event(
        &self,
        event_type: &str,
        message_id: &str,
    ) -> Result<Value, Error> {
        let action = self
            .0
            .actions()
            .ok_or_else(|| Error::NotFound("event service exposes no actions".to_string()))?
            .get("#EventService.SubmitTestEvent")?;
        action
            .invoke(json!({ "EventType": event_type, "MessageId": message_id }))
            .await
    }
}

pub struct CertificateServiceHandler;

#[async_trait]
impl Handler for CertificateServiceHandler {
    fn name(&self) -> &'static str {
        "CertificateService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/CertificateService",
            "#CertificateService..CertificateService",
            "#ServiceRoot..ServiceRoot/CertificateService",
        ]
    }
}

pub struct TelemetryServiceHandler;

#[async_trait]
impl Handler for TelemetryServiceHandler {
    fn name(&self) -> &'static str {
        "TelemetryService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/TelemetryService",
            "#TelemetryService..TelemetryService",
            "#ServiceRoot..ServiceRoot/TelemetryService",
        ]
    }
}

pub struct UpdateServiceHandler;

#[async_trait]
impl Handler for UpdateServiceHandler {
    fn name(&self) -> &'static str {
        "UpdateService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/UpdateService",
            "#UpdateService..UpdateService",
            "#ServiceRoot..ServiceRoot/UpdateService",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::defaults;
    use crate::mock::MockTransport;
    use crate::registry::CompositeDispatch;
    use crate::transport::Method;
    use std::sync::Arc;

    fn client() -> (Client, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let dispatch = CompositeDispatch::defaults_only(defaults().unwrap());
        (Client::new(transport.clone(), dispatch), transport)
    }

    fn serve_root(transport: &MockTransport) {
        transport.serve(
            "/redfish/v1",
            serde_json::json!({
                "@odata.id": "/redfish/v1",
                "@odata.type": "#ServiceRoot.v1_11_0.ServiceRoot",
                "AccountService": {"@odata.id": "/redfish/v1/AccountService"},
                "SessionService": {"@odata.id": "/redfish/v1/SessionService"},
                "Managers": {"@odata.id": "/redfish/v1/Managers"}
            }),
        );
        transport.serve(
            "/redfish/v1/Managers",
            serde_json::json!({
                "@odata.id": "/redfish/v1/Managers",
                "Members": [{"@odata.id": "/redfish/v1/Managers/bmc"}]
            }),
        );
        transport.serve(
            "/redfish/v1/Managers/bmc",
            serde_json::json!({
                "@odata.id": "/redfish/v1/Managers/bmc",
                "@odata.type": "#Manager.v1_5_0.Manager",
                "Actions": {
                    "#Manager.Reset": {
                        "target": "/redfish/v1/Managers/bmc/Actions/Manager.Reset"
                    }
                }
            }),
        );
        transport.route("/redfish/v1/Managers/{ManagerId}/Actions/Manager.Reset");
    }

    #[tokio::test]
    async fn service_root_pins_the_singleton_manager() {
        let (client, transport) = client();
        serve_root(&transport);

        let root = ServiceRoot::fetch(&client).await.unwrap();
        let manager = root.manager().unwrap();
        assert_eq!(manager.root().identifier().unwrap(), "/redfish/v1/Managers/bmc");
        assert_eq!(manager.root().handler().name(), "Manager");
    }

    #[tokio::test]
    async fn manager_reset_invokes_the_reset_action() {
        let (client, transport) = client();
        serve_root(&transport);

        let root = ServiceRoot::fetch(&client).await.unwrap();
        let manager = root.manager().unwrap();
        manager.reset("GracefulRestart").await.unwrap();

        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "/redfish/v1/Managers/bmc/Actions/Manager.Reset");
        assert_eq!(posts[0].payload["ResetType"], "GracefulRestart");
    }

    #[tokio::test]
    async fn account_password_change_goes_through_patch() {
        let (client, transport) = client();
        transport.serve(
            "/redfish/v1/AccountService/Accounts/2",
            serde_json::json!({
                "@odata.id": "/redfish/v1/AccountService/Accounts/2",
                "UserName": "root",
                "Enabled": true
            }),
        );

        let account =
            ManagerAccount::fetch(&client, "/redfish/v1/AccountService/Accounts/2")
                .await
                .unwrap();
        assert_eq!(account.username(), Some("root"));
        account.set_password("hunter2").await.unwrap();

        let mutations = transport.mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].method, Method::Patch);
        assert_eq!(
            mutations[0].payload.as_ref().unwrap()["Password"],
            "hunter2"
        );
    }

    #[tokio::test]
    async fn session_bootstrap_installs_the_token() {
        let (client, transport) = client();
        transport.serve(
            "/redfish/v1/SessionService",
            serde_json::json!({
                "@odata.id": "/redfish/v1/SessionService",
                "@odata.type": "#SessionService.v1_1_8.SessionService",
                "Sessions": {"@odata.id": "/redfish/v1/SessionService/Sessions"}
            }),
        );
        transport.route("/redfish/v1/SessionService/Sessions");
        transport.serve(
            "/redfish/v1/SessionService/Sessions",
            serde_json::json!({
                "@odata.id": "/redfish/v1/SessionService/Sessions/1",
                "X-Auth-Token": "tok-123"
            }),
        );

        let service = SessionService::fetch(&client, "/redfish/v1/SessionService")
            .await
            .unwrap();
        let session = service.create_session("root", "calvin").await.unwrap();
        assert!(session.is_some());
        assert_eq!(
            transport.credential(),
            Some(Credential::SessionToken("tok-123".to_string()))
        );
    }

    #[tokio::test]
    async fn failed_session_exchange_restores_the_basic_credential() {
        let (client, transport) = client();
        transport.serve(
            "/redfish/v1/SessionService",
            serde_json::json!({
                "@odata.id": "/redfish/v1/SessionService",
                "Sessions": {"@odata.id": "/redfish/v1/SessionService/Sessions"}
            }),
        );
        transport.route("/redfish/v1/SessionService/Sessions");
        transport.serve(
            "/redfish/v1/SessionService/Sessions",
            serde_json::json!({
                "error": {"code": "Base.1.0.AccessDenied", "message": "denied"}
            }),
        );

        let service = SessionService::fetch(&client, "/redfish/v1/SessionService")
            .await
            .unwrap();
        let result = service.create_session("root", "calvin").await;
        assert!(matches!(result, Err(Error::RemoteFault(_))));
        assert_eq!(
            transport.credential(),
            Some(Credential::Basic {
                username: "root".to_string(),
                password: "calvin".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_polls_until_the_task_leaves_running() {
        let (client, transport) = client();
        transport.serve(
            "/redfish/v1/TaskService",
            serde_json::json!({
                "@odata.id": "/redfish/v1/TaskService",
                "@odata.type": "#TaskService.v1_1_5.TaskService",
                "Tasks": {"@odata.id": "/redfish/v1/TaskService/Tasks"}
            }),
        );
        transport.serve(
            "/redfish/v1/TaskService/Tasks",
            serde_json::json!({
                "@odata.id": "/redfish/v1/TaskService/Tasks",
                "Members": []
            }),
        );
        transport.serve_sequence(
            "/redfish/v1/TaskService/Tasks/42",
            vec![
                serde_json::json!({"Id": "42", "TaskState": "Running", "TaskStatus": "OK"}),
                serde_json::json!({"Id": "42", "TaskState": "Running", "TaskStatus": "OK"}),
                serde_json::json!({"Id": "42", "TaskState": "Completed", "TaskStatus": "OK"}),
            ],
        );

        let service = TaskService::fetch(&client, "/redfish/v1/TaskService")
            .await
            .unwrap();
        let task = service
            .wait_for("42", Duration::from_secs(7), Duration::from_secs(700))
            .await
            .unwrap();
        assert_eq!(task.task_state(), Some("Completed"));
        assert_eq!(transport.fetch_count("/redfish/v1/TaskService/Tasks/42"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_on_a_stuck_task() {
        let (client, transport) = client();
        transport.serve(
            "/redfish/v1/TaskService",
            serde_json::json!({
                "@odata.id": "/redfish/v1/TaskService",
                "Tasks": {"@odata.id": "/redfish/v1/TaskService/Tasks"}
            }),
        );
        transport.serve(
            "/redfish/v1/TaskService/Tasks",
            serde_json::json!({"@odata.id": "/redfish/v1/TaskService/Tasks", "Members": []}),
        );
        transport.serve(
            "/redfish/v1/TaskService/Tasks/42",
            serde_json::json!({"Id": "42", "TaskState": "Running", "TaskStatus": "OK"}),
        );

        let service = TaskService::fetch(&client, "/redfish/v1/TaskService")
            .await
            .unwrap();
        let result = service
            .wait_for("42", Duration::from_secs(7), Duration::from_secs(30))
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }
}
