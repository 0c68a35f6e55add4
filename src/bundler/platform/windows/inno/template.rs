//! Inno Setup and resource script templates.

/// Installer script. Rendered without HTML escaping.
pub const ISS_TEMPLATE: &str = r#"#define AppName "{{name}}"
#define AppVersion "{{version}}"

[Setup]
AppId={{app_id}}
AppName={#AppName}
AppVersion={#AppVersion}
AppPublisher={#AppName}
DefaultDirName={commonpf}\{#AppName}
DefaultGroupName={#AppName}
OutputDir=.
OutputBaseFilename={#AppName}
Compression=lzma2
SolidCompression=yes
WizardStyle=modern
DisableReadyPage=yes
DisableWelcomePage=no
UninstallDisplayIcon={app}\{#AppName}.exe
CreateAppDir=yes
UsePreviousAppDir=no
WizardResizable=no
ShowLanguageDialog=no
ArchitecturesInstallIn64BitMode=x64compatible
ArchitecturesAllowed=x64compatible
{{#if install_icon}}
SetupIconFile=install.ico
{{/if}}
{{#if associations}}
ChangesAssociations=yes
{{/if}}

[Messages]
WelcomeLabel1=Welcome to the [name] Setup Wizard
WelcomeLabel2=This will install [name/ver] on your computer.%n%nIt is recommended that you close all other applications before continuing.
ClickNext=Click Next to continue.
FinishedHeadingLabel=[name] has been successfully installed

[Files]
Source: "app\*"; DestDir: "{app}"; Flags: ignoreversion recursesubdirs createallsubdirs
{{#if document_icon}}
Source: "document.ico"; DestDir: "{app}"; Flags: ignoreversion
{{/if}}

[UninstallDelete]
Type: dirifempty; Name: "{app}\app"
Type: dirifempty; Name: "{app}\runtime"
Type: dirifempty; Name: "{app}"

[Icons]
Name: "{group}\{#AppName}"; Filename: "{app}\{#AppName}.exe"; WorkingDir: "{app}"
Name: "{group}\Uninstall {#AppName}"; Filename: "{uninstallexe}"
Name: "{autodesktop}\{#AppName}"; Filename: "{app}\{#AppName}.exe"

{{#if associations}}
[Registry]
{{#each extensions}}
Root: HKCR; Subkey: ".{{this}}"; ValueType: string; ValueName: ""; ValueData: "{#AppName}"; Flags: uninsdeletevalue
{{/each}}
Root: HKCR; Subkey: "{#AppName}"; ValueType: string; ValueName: ""; ValueData: "{{document_name}}"; Flags: uninsdeletekey
{{#if document_icon}}
Root: HKCR; Subkey: "{#AppName}\DefaultIcon"; ValueType: string; ValueName: ""; ValueData: "{app}\document.ico,0"; Flags: uninsdeletekey
{{/if}}
Root: HKCR; Subkey: "{#AppName}\shell\open\command"; ValueType: string; ValueName: ""; ValueData: """{app}\{#AppName}.exe"" ""%1"""; Flags: uninsdeletekey

{{/if}}
[Run]
Filename: "{app}\{#AppName}.exe"; Description: "Launch {#AppName}"; Flags: nowait postinstall skipifsilent
"#;

/// VERSIONINFO resource script compiled by resourcehacker.
pub const VERSION_RC_TEMPLATE: &str = r#"// Generated by kpacker
1 VERSIONINFO
FILEVERSION {{major}},{{minor}},{{patch}},{{build}}
PRODUCTVERSION {{major}},{{minor}},{{patch}},{{build}}
FILEOS 0x40004
FILETYPE 0x1
{
BLOCK "StringFileInfo"
{
	BLOCK "040904B0"
	{
		VALUE "CompanyName", "{{name}}"
		VALUE "FileDescription", "{{name}}"
		VALUE "FileVersion", "{{version}}"
		VALUE "InternalName", "{{name}}.exe"
		VALUE "LegalCopyright", "Copyright \xA9 {{year}}"
		VALUE "OriginalFilename", "{{name}}.exe"
		VALUE "ProductName", "{{name}}"
		VALUE "ProductVersion", "{{version}}"
	}
}

BLOCK "VarFileInfo"
{
	VALUE "Translation", 0x0409 0x04B0
}
}
"#;
