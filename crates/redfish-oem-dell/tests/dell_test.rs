use std::sync::Arc;

use serde_json::json;

use redfish_client::client::Client;
use redfish_client::entities::{self, ServiceRoot};
use redfish_client::mock::MockTransport;
use redfish_client::registry::CompositeDispatch;
use redfish_client::transport::Method;
use redfish_client::{Error, ResourceKind};
use redfish_oem_dell::{dell_registry, DellAttributes};

fn dell_client(transport: Arc<MockTransport>) -> Client {
    let dispatch = CompositeDispatch::new(
        dell_registry().unwrap(),
        entities::defaults().unwrap(),
    );
    Client::new(transport, dispatch)
}

fn serve_manager(transport: &MockTransport) {
    transport.serve(
        "/redfish/v1",
        json!({
            "@odata.id": "/redfish/v1",
            "@odata.type": "#ServiceRoot.v1_11_0.ServiceRoot",
            "Managers": {"@odata.id": "/redfish/v1/Managers"}
        }),
    );
    transport.serve(
        "/redfish/v1/Managers",
        json!({
            "@odata.id": "/redfish/v1/Managers",
            "Members": [{"@odata.id": "/redfish/v1/Managers/iDRAC.Embedded.1"}]
        }),
    );
    transport.serve(
        "/redfish/v1/Managers/iDRAC.Embedded.1",
        json!({
            "@odata.id": "/redfish/v1/Managers/iDRAC.Embedded.1",
            "@odata.type": "#Manager.v1_5_0.Manager",
            "Actions": {
                "#Manager.Reset": {
                    "target": "/redfish/v1/Managers/iDRAC.Embedded.1/Actions/Manager.Reset"
                },
                "Oem": {
                    "#OemManager.ExportSystemConfiguration": {
                        "target": "/redfish/v1/Managers/iDRAC.Embedded.1/Actions/Oem/EID_674_Manager.ExportSystemConfiguration"
                    }
                }
            }
        }),
    );
    transport.route("/redfish/v1/Managers/{ManagerId}/Actions/Manager.Reset");
    transport.route(
        "/redfish/v1/Managers/{ManagerId}/Actions/Oem/EID_674_Manager.ExportSystemConfiguration",
    );
}

#[tokio::test]
async fn dell_attribute_store_dispatches_by_route() {
    let transport = Arc::new(MockTransport::new());
    transport.serve(
        "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
        json!({
            "@odata.id": "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
            "Attributes": {
                "NTPConfigGroup.1.NTP1": "ntp.example.org",
                "NTPConfigGroup.1.NTPEnable": "Enabled",
                "Users.2.UserName": "root"
            }
        }),
    );
    let client = dell_client(transport.clone());

    let attributes = DellAttributes::fetch(
        &client,
        "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
    )
    .await
    .unwrap();

    assert_eq!(attributes.root().handler().name(), "DellAttributes");
    assert_eq!(
        attributes.attribute("NTPConfigGroup.1.NTP1").unwrap(),
        "ntp.example.org"
    );
    assert_eq!(attributes.attribute("Users.2.UserName").unwrap(), "root");
    assert!(attributes.attribute("Users.9.UserName").is_none());
}

#[tokio::test]
async fn attribute_writes_patch_the_attribute_store() {
    let transport = Arc::new(MockTransport::new());
    transport.serve(
        "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
        json!({
            "@odata.id": "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
            "Attributes": {"NTPConfigGroup.1.NTPEnable": "Disabled"}
        }),
    );
    let client = dell_client(transport.clone());

    let attributes = DellAttributes::fetch(
        &client,
        "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1",
    )
    .await
    .unwrap();
    attributes
        .set_attributes(json!({"NTPConfigGroup.1.NTPEnable": "Enabled"}))
        .await
        .unwrap();

    let mutations = transport.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].method, Method::Patch);
    assert_eq!(
        mutations[0].payload.as_ref().unwrap()["Attributes"]["NTPConfigGroup.1.NTPEnable"],
        "Enabled"
    );
}

#[tokio::test]
async fn dell_oem_marker_shadows_the_default_for_manager_actions() {
    let transport = Arc::new(MockTransport::new());
    serve_manager(&transport);
    let client = dell_client(transport.clone());

    let root = ServiceRoot::fetch(&client).await.unwrap();
    let manager = root.manager().unwrap();

    let actions = manager
        .root()
        .resolve("Actions")
        .unwrap()
        .into_resource("Actions")
        .unwrap();
    // The plain Actions marker still comes from the defaults...
    assert_eq!(actions.handler().name(), "Actions");

    // ...but the Oem sub-object dispatches to the Dell override.
    let oem = actions.resolve("Oem").unwrap().into_resource("Oem").unwrap();
    assert_eq!(oem.handler().name(), "DellManagerActionsOem");
    assert_eq!(oem.path(), "/Actions/Oem");
}

#[tokio::test]
async fn export_action_flattens_the_simplified_parameter_set() {
    let transport = Arc::new(MockTransport::new());
    serve_manager(&transport);
    let client = dell_client(transport.clone());

    let root = ServiceRoot::fetch(&client).await.unwrap();
    let manager = root.manager().unwrap();

    let export = manager
        .root()
        .oem_actions()
        .unwrap()
        .get("#OemManager.ExportSystemConfiguration")
        .unwrap();
    export
        .invoke(json!({
            "format": "xml",
            "use": "Default",
            "target": "ALL",
            "filename": "config.xml",
            "share_type": "NFS",
            "ip": "192.0.2.10",
            "share_name": "/exports"
        }))
        .await
        .unwrap();

    let posts = transport.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].url,
        "/redfish/v1/Managers/iDRAC.Embedded.1/Actions/Oem/EID_674_Manager.ExportSystemConfiguration"
    );
    assert_eq!(
        posts[0].payload,
        json!({
            "ExportFormat": "XML",
            "ExportUse": "Default",
            "ShareParameters": {
                "Target": ["ALL"],
                "FileName": "config.xml",
                "ShareType": "NFS",
                "IPAddress": "192.0.2.10",
                "ShareName": "/exports"
            }
        })
    );
    assert_eq!(posts[0].parameters["ManagerId"], "iDRAC.Embedded.1");
}

#[tokio::test]
async fn export_fault_carries_the_extended_info() {
    let transport = Arc::new(MockTransport::new());
    serve_manager(&transport);
    transport.serve(
        "/redfish/v1/Managers/iDRAC.Embedded.1/Actions/Oem/EID_674_Manager.ExportSystemConfiguration",
        json!({
            "error": {
                "code": "Base.1.0.GeneralError",
                "message": "A general error has occurred.",
                "@Message.ExtendedInfo": [
                    {"MessageId": "IDRAC.2.8.SUP029", "Message": "unsupported firmware packages"}
                ]
            }
        }),
    );
    let client = dell_client(transport.clone());

    let root = ServiceRoot::fetch(&client).await.unwrap();
    let manager = root.manager().unwrap();
    let export = manager
        .root()
        .oem_actions()
        .unwrap()
        .get("#OemManager.ExportSystemConfiguration")
        .unwrap();

    match export.invoke(json!({"target": "ALL"})).await {
        Err(Error::RemoteFault(envelope)) => {
            assert_eq!(envelope.extended_info[0].message_id, "IDRAC.2.8.SUP029");
        }
        other => panic!("expected remote fault, got {other:?}"),
    }
}
